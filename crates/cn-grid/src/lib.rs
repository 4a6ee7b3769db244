//! `cn-grid` - Cannon's algorithm over a square grid of message-passing workers.
//!
//! Each of the d² workers owns one block of A, B and C. After an initial
//! skew, every round multiplies the local blocks into C and then shifts A
//! one step left and B one step up; after d rounds each C block holds its
//! share of A·B.

pub mod comm;
pub mod config;
pub mod error;
pub mod init;
pub mod run;
pub mod source;
pub mod stepper;
pub mod topology;
pub mod verify;

pub use comm::{CommError, Communicator, LocalComm, LocalWorld, SendRequest};
pub use config::{CannonConfig, GridShape};
pub use error::{CannonError, Result};
pub use init::{BlockInitializer, InitialBlocks};
pub use run::{run, RunReport};
pub use source::{IdentityFixture, MatrixSource, RandomIntegerFixture};
pub use stepper::{CannonStepper, StepState};
pub use topology::{GridCoordinate, NeighborSet, ProcessGrid};
pub use verify::ResultVerifier;
