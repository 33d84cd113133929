pub mod ports;
pub mod normalize_use_case;
pub mod load_use_case;
pub mod verify_use_case;

pub use load_use_case::{clear_all, LoadRun, LoadUseCase};
pub use normalize_use_case::NormalizeUseCase;
pub use verify_use_case::{VerificationReport, VerifyUseCase};
