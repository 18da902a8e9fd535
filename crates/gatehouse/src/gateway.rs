//! Maps wire requests onto [`AuthService`] calls.
//!
//! This is the only place that knows both the protocol types and the
//! service API. Transports (the WebSocket handler, or anything else)
//! decode a [`Request`], call [`AuthService::dispatch`], and encode the
//! [`Response`].

use gatehouse_protocol::{Request, Response};
use gatehouse_session::SessionStore;
use gatehouse_store::Persistence;

use crate::log::EventLog;
use crate::password::PasswordHasher;
use crate::{AuthError, AuthService};

impl<P, S, H, L> AuthService<P, S, H, L>
where
    P: Persistence,
    S: SessionStore,
    H: PasswordHasher,
    L: EventLog,
{
    /// Runs one request. Never fails: errors become
    /// [`Response::Error`] with the kind's status code.
    pub async fn dispatch(&self, request: Request) -> Response {
        let op = request.op();

        match self.route(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(op, kind = ?err.kind(), error = %err, "request failed");
                Response::error(err.kind(), err.to_string())
            }
        }
    }

    async fn route(&self, request: Request) -> Result<Response, AuthError> {
        match request {
            Request::Register { username, password } => {
                let ticket = self.register(&username, &password).await?;
                Ok(Response::Ticket { ticket })
            }
            Request::Login { username, password } => {
                let ticket = self.login(&username, &password).await?;
                Ok(Response::Ticket { ticket })
            }
            Request::Verify { ticket, player_id } => {
                let character = self.verify_session(&ticket, player_id).await?;
                Ok(Response::Character { character })
            }
            Request::VerifyPrimary { ticket } => {
                let character = self.verify_primary(&ticket).await?;
                Ok(Response::Character { character })
            }
            Request::ListCharacters { ticket } => {
                let characters = self.list_characters(&ticket).await?;
                Ok(Response::Characters { characters })
            }
            Request::CreateCharacter { ticket, name } => {
                let character = self.create_character(&ticket, &name).await?;
                Ok(Response::Character { character })
            }
            Request::Logout { ticket } => {
                self.logout(&ticket).await?;
                Ok(Response::LoggedOut)
            }
            Request::DeleteAccount { ticket, password } => {
                let deletion = self.delete_account(&ticket, &password).await?;
                Ok(Response::AccountDeleted {
                    account_id: deletion.account_id,
                    deleted_character_count: deletion.deleted_character_count,
                })
            }
        }
    }
}
