//! Pipeline error types

use crate::report::StageKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{stage} stage produced no survivors ({attempted} attempted)")]
    StageAborted {
        stage: StageKind,
        attempted: usize,
    },

    #[error("run interrupted by operator")]
    Interrupted,

    #[error("Cloud error: {0}")]
    Cloud(#[from] keyflow_cloud::CloudError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
