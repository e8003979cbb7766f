//! Request/response shapes for the HTTP surface. Kept separate
//! from the domain types in `aiq-core`/`aiq-store` so a wire-format change
//! never has to touch scoring or persistence code, and so a user's password
//! hash can never accidentally round-trip back out over the wire.

use aiq_core::cat::TestResult;
use aiq_core::item::{DifficultyTier, Domain};
use aiq_core::{Item, StoppingReason, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub user: UserDto,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// `/auth/refresh` takes its refresh token the same way every other
/// authenticated route takes an access token: as the bearer credential in
/// the `Authorization` header, not a JSON body field.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct RequestPasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct GenericMessage {
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// The client-facing view of an item: no `correct_option`, no classical or
/// IRT statistics, domain/tier only.
#[derive(Debug, Serialize)]
pub struct ItemDto {
    pub id: i64,
    pub prompt: String,
    pub stimulus: Option<String>,
    pub options: Vec<String>,
    pub domain: Domain,
    pub difficulty_tier: DifficultyTier,
}

impl From<&Item> for ItemDto {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            prompt: item.prompt.clone(),
            stimulus: item.stimulus.clone(),
            options: item.options.clone(),
            domain: item.domain,
            difficulty_tier: item.difficulty_tier,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    #[serde(default)]
    pub adaptive: bool,
    pub question_count: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session_id: i64,
    pub adaptive: bool,
    /// Present only for an adaptive session: the first item to serve.
    pub next_question: Option<ItemDto>,
    /// Present only for a fixed-form session: the entire form up front.
    pub questions: Option<Vec<ItemDto>>,
    pub current_theta: f64,
    pub current_se: f64,
}

#[derive(Debug, Deserialize)]
pub struct NextRequest {
    pub session_id: i64,
    pub question_id: i64,
    pub user_answer: String,
    pub time_spent_seconds: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct TestResultDto {
    pub iq: i32,
    pub iq_se: f64,
    pub confidence_interval: (i32, i32),
    pub final_theta: f64,
    pub final_se: f64,
    pub stopping_reason: StoppingReason,
    pub validity: ValidityDto,
}

#[derive(Debug, Serialize)]
pub struct ValidityDto {
    pub score_percentile: aiq_core::ScorePercentile,
    pub fit_ratio: f64,
    pub fit_flag: aiq_core::FitFlag,
}

impl TestResultDto {
    pub fn new(result: &TestResult, validity: &aiq_core::ValidityReport) -> Self {
        Self {
            iq: result.iq,
            iq_se: result.iq_se,
            confidence_interval: result.confidence_interval,
            final_theta: result.final_theta,
            final_se: result.final_se,
            stopping_reason: result.stopping_reason,
            validity: ValidityDto {
                score_percentile: validity.score_percentile,
                fit_ratio: validity.fit_ratio,
                fit_flag: validity.fit_flag,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NextResponse {
    pub test_complete: bool,
    pub next_question: Option<ItemDto>,
    pub items_administered: u32,
    pub current_theta: f64,
    pub current_se: f64,
    pub result: Option<TestResultDto>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAnswer {
    pub question_id: i64,
    pub user_answer: String,
    pub time_spent_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub session_id: i64,
    pub responses: Vec<SubmitAnswer>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub result: TestResultDto,
}

#[derive(Debug, Serialize)]
pub struct ReliabilityDto {
    pub computed_at: DateTime<Utc>,
    pub cronbach_alpha: Option<f64>,
    pub test_retest: Option<f64>,
    pub split_half_spearman_brown: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ReliabilityHistoryQuery {
    pub metric_type: Option<String>,
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct AnchorItemDto {
    pub id: i64,
    pub domain: Domain,
    pub difficulty_tier: DifficultyTier,
    pub empirical_p: f64,
    pub anchor: bool,
}

impl From<&Item> for AnchorItemDto {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            domain: item.domain,
            difficulty_tier: item.difficulty_tier,
            empirical_p: item.empirical_p,
            anchor: item.anchor,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnchorToggleRequest {
    pub item_id: i64,
    pub anchor: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct AnchorAutoSelectRequest {
    pub per_domain: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LogoutAllEventDto {
    pub user_id: i64,
    pub revoked_before: DateTime<Utc>,
    pub correlated_reset_tokens: Vec<DateTime<Utc>>,
}
