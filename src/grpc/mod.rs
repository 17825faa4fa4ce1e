//! tonic service implementations over the console services.

pub mod health;
pub mod moderation;
pub mod reports;
pub mod taxonomy;
pub mod users;

pub use health::HealthServiceImpl;
pub use moderation::ModerationServiceImpl;
pub use reports::ReportsServiceImpl;
pub use taxonomy::TaxonomyServiceImpl;
pub use users::UsersServiceImpl;

use std::sync::Arc;

use tonic::{Request, Status};

use crate::proto::common::{ConfirmationPrompt as ProtoPrompt, Outcome as ProtoOutcome, OutcomeRes};
use crate::services::{ConfirmationPrompt, Decision, Outcome};
use crate::session::{AdminSession, AuthenticatedUser, SessionRegistry};

/// Resolves the caller's console session from the identity the auth layer injected.
fn session_for<T>(
    sessions: &SessionRegistry,
    request: &Request<T>,
) -> Result<Arc<AdminSession>, Status> {
    let user = request.extensions().get::<AuthenticatedUser>().cloned();
    Ok(sessions.session_for(user)?)
}

fn decision(accepted: bool) -> Decision {
    if accepted {
        Decision::Accepted
    } else {
        Decision::Declined
    }
}

fn prompt_to_proto(prompt: ConfirmationPrompt) -> ProtoPrompt {
    ProtoPrompt {
        title: prompt.title,
        details: prompt.details,
    }
}

fn outcome_to_proto(outcome: Outcome) -> OutcomeRes {
    let outcome = match outcome {
        Outcome::Applied => ProtoOutcome::Applied,
        Outcome::Declined => ProtoOutcome::Declined,
    };
    OutcomeRes {
        outcome: outcome.into(),
    }
}
