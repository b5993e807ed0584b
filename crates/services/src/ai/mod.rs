pub mod feedback;
pub mod generation_client;
pub mod generator;
pub mod grading;
pub mod transport;

pub use feedback::{FEEDBACK_FALLBACK, FeedbackSynthesizer};
pub use generation_client::{GenerationClient, GenerationOutcome, NoResultReason};
pub use generator::QuestionGenerator;
pub use grading::{AnswerGrader, GRADING_FALLBACK_FEEDBACK};
pub use transport::{GeminiTransport, GenerationParams, GenerationRequest, ModelTransport};
