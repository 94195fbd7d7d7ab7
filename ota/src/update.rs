/*++

Licensed under the Apache-2.0 license.

File Name:

    update.rs

Abstract:

    Update session flow - quiesce, receive, verify, hand over to commit.

--*/

use crate::commit::{self, CommitPlan};
use crate::env::UpdateEnv;
use crate::error::UpdateError;
use crate::quiesce;
use crate::reception::{read_crc_announcement, receive_image};
use crate::session::UpdateSession;
use crate::staging::StagingWriter;
use crate::supervisor;
use crate::verify::{verify_image, IntegrityVerifier};
use core::fmt::Write;
use ota_protocol::COMMIT_ACK;

/// How a call to [`run_update`] ended. Failures do not appear here: every
/// failure path ends in a watchdog reboot inside [`supervisor::abort`].
pub enum SessionOutcome<'r> {
    /// A session was already active; the duplicate start was a no-op.
    AlreadyActive,
    /// The staged image passed every check and is preloaded in RAM. The
    /// caller must now invoke its RAM-resident commit routine with this
    /// plan; there is nothing else legal to do with it.
    Commit(CommitPlan<'r>),
}

/// Drive one update session end to end.
///
/// `ram` is the commit preload buffer; it bounds the largest acceptable
/// image. Returns only for a duplicate start (no-op) or with a commit
/// plan; every failure resets the machine.
pub fn run_update<'r>(env: &mut UpdateEnv, ram: &'r mut [u8]) -> SessionOutcome<'r> {
    if !quiesce::try_begin(env) {
        return SessionOutcome::AlreadyActive;
    }

    supervisor::arm_for_receive(env);
    let mut session = UpdateSession::new();
    session.start();

    match run_session(env, &mut session, ram) {
        Ok(plan) => {
            // the sender waits for this before it starts timing out the
            // copy-and-reset window
            for byte in COMMIT_ACK {
                env.transport.write_byte(byte);
            }
            env.transport.flush();

            supervisor::arm_for_commit(env);
            crate::println!(
                "[ota] committing {} bytes, serial log pauses until reset",
                plan.image_len()
            );
            SessionOutcome::Commit(plan)
        }
        Err(err) => {
            session.fault();
            supervisor::abort(env, err)
        }
    }
}

/// The non-destructive part of the session: reception through commit
/// preparation. Separated from [`run_update`] so the whole flow runs on
/// the host against mocks.
pub fn run_session<'r>(
    env: &mut UpdateEnv,
    session: &mut UpdateSession,
    ram: &'r mut [u8],
) -> Result<CommitPlan<'r>, UpdateError> {
    let mut staging = StagingWriter::new(env.flash, &env.map)?;
    let mut verifier = IntegrityVerifier::new();

    let image_len = receive_image(env, session, &mut staging, &mut verifier)?;
    session.transfer_complete();

    let announced = read_crc_announcement(env);
    verify_image(env, &verifier, image_len, announced)?;

    let plan = commit::prepare(env, image_len, ram)?;
    session.image_accepted();
    Ok(plan)
}
