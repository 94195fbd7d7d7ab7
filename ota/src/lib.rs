/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    In-field firmware update engine for the espresso controller.

--*/

#![cfg_attr(target_arch = "arm", no_std)]
#![allow(static_mut_refs)]

mod commit;
mod env;
mod error;
pub mod hil;
pub mod log;
mod quiesce;
mod reception;
mod session;
mod staging;
mod supervisor;
pub mod trace;
mod update;
mod verify;

pub use commit::{burn, execute, prepare, CommitPlan};
pub use env::UpdateEnv;
pub use error::UpdateError;
pub use quiesce::{companion_park_requested, try_begin, update_in_progress};
pub use reception::{read_crc_announcement, receive_image};
pub use session::{States as SessionState, UpdateSession};
pub use staging::StagingWriter;
pub use supervisor::{abort, arm_for_commit, arm_for_receive, fail_session};
pub use update::{run_session, run_update, SessionOutcome};
pub use verify::{verify_image, IntegrityVerifier, VectorSignature};
