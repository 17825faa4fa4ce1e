use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::models::{User, UserProfile};
use crate::proto::common::{ConfirmationPrompt as ProtoPrompt, Empty, OutcomeRes};
use crate::proto::users::users_service_server::UsersService;
use crate::proto::users::{
    DeleteUserReq, ListUsersRes, UpdateUserReq, User as ProtoUser, UserIdReq,
    UserProfile as ProtoUserProfile,
};
use crate::services::UserService;
use crate::session::SessionRegistry;

use super::{decision, outcome_to_proto, prompt_to_proto, session_for};

pub struct UsersServiceImpl {
    users: Arc<UserService>,
    sessions: Arc<SessionRegistry>,
}

impl UsersServiceImpl {
    pub fn new(users: Arc<UserService>, sessions: Arc<SessionRegistry>) -> Self {
        Self { users, sessions }
    }

    fn user_to_proto(user: User) -> ProtoUser {
        ProtoUser {
            role_label: user.role_label().to_string(),
            id: user.id,
            profile: Some(ProtoUserProfile {
                name: user.name,
                email: user.email,
                phone_number: user.phone_number,
                role: user.role,
            }),
        }
    }

    fn profile_from_proto(profile: Option<ProtoUserProfile>) -> Result<UserProfile, Status> {
        let profile = profile.ok_or_else(|| Status::invalid_argument("profile is required"))?;
        Ok(UserProfile {
            name: profile.name,
            email: profile.email,
            phone_number: profile.phone_number,
            role: profile.role,
        })
    }
}

#[tonic::async_trait]
impl UsersService for UsersServiceImpl {
    async fn list_users(&self, request: Request<Empty>) -> Result<Response<ListUsersRes>, Status> {
        session_for(&self.sessions, &request)?;
        let users = self.users.list_users().await?;
        Ok(Response::new(ListUsersRes {
            users: users.into_iter().map(Self::user_to_proto).collect(),
        }))
    }

    async fn get_user(&self, request: Request<UserIdReq>) -> Result<Response<ProtoUser>, Status> {
        session_for(&self.sessions, &request)?;
        let user = self.users.get_user(&request.into_inner().id).await?;
        Ok(Response::new(Self::user_to_proto(user)))
    }

    async fn add_user(
        &self,
        request: Request<ProtoUserProfile>,
    ) -> Result<Response<ProtoUser>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let profile = Self::profile_from_proto(Some(request.into_inner()))?;
        let user = self.users.add_user(&session, &profile).await?;
        Ok(Response::new(Self::user_to_proto(user)))
    }

    async fn update_user(&self, request: Request<UpdateUserReq>) -> Result<Response<Empty>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let req = request.into_inner();
        let profile = Self::profile_from_proto(req.profile)?;
        self.users.update_user(&session, &req.id, &profile).await?;
        Ok(Response::new(Empty {}))
    }

    async fn prepare_delete(
        &self,
        request: Request<UserIdReq>,
    ) -> Result<Response<ProtoPrompt>, Status> {
        session_for(&self.sessions, &request)?;
        let prepared = self.users.prepare_delete(&request.into_inner().id).await?;
        Ok(Response::new(prompt_to_proto(prepared.prompt)))
    }

    async fn delete_user(
        &self,
        request: Request<DeleteUserReq>,
    ) -> Result<Response<OutcomeRes>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let req = request.into_inner();

        let prepared = self.users.prepare_delete(&req.id).await?;
        let outcome = self
            .users
            .delete_user(&session, &prepared, decision(req.accepted))
            .await?;
        Ok(Response::new(outcome_to_proto(outcome)))
    }
}
