use rocket::request::{self, Request, FromRequest, Outcome};
use rocket::http::Status;
use rocket::State;
use mongodb::bson::oid::ObjectId;
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use rocket_okapi::r#gen::OpenApiGenerator;

use crate::db::{find_user, DbConn};
use crate::guards::AuthGuard;
use crate::models::UserRole;

/// Resolves the caller's account and checks it is active and holds `role`.
async fn require_role(req: &Request<'_>, role: UserRole) -> request::Outcome<ObjectId, ()> {
    let auth = match req.guard::<AuthGuard>().await {
        Outcome::Success(auth) => auth,
        Outcome::Error(e) => return Outcome::Error(e),
        Outcome::Forward(f) => return Outcome::Forward(f),
    };
    if auth.role != role {
        return Outcome::Error((Status::Forbidden, ()));
    }

    let db = match req.guard::<&State<DbConn>>().await {
        Outcome::Success(db) => db,
        _ => {
            error!("Role guard: database is not managed");
            return Outcome::Error((Status::InternalServerError, ()));
        }
    };

    match find_user(db, &auth.user_id).await {
        Ok(Some(user)) if user.is_active && user.role == role => {
            Outcome::Success(auth.user_id)
        }
        Ok(Some(user)) => {
            warn!(
                "Role guard rejected {}: active={}, role={}",
                auth.user_id,
                user.is_active,
                user.role.as_str()
            );
            Outcome::Error((Status::Forbidden, ()))
        }
        Ok(None) => {
            warn!("Role guard rejected {}: account not found", auth.user_id);
            Outcome::Error((Status::Forbidden, ()))
        }
        Err(e) => {
            error!("Role guard lookup failed: {}", e.message);
            Outcome::Error((Status::InternalServerError, ()))
        }
    }
}

macro_rules! role_guard {
    ($name:ident, $role:expr) => {
        pub struct $name {
            pub user_id: ObjectId,
        }

        #[rocket::async_trait]
        impl<'r> FromRequest<'r> for $name {
            type Error = ();

            async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
                require_role(req, $role)
                    .await
                    .map(|user_id| $name { user_id })
            }
        }

        impl<'a> OpenApiFromRequest<'a> for $name {
            fn from_request_input(
                _gen: &mut OpenApiGenerator,
                _name: String,
                _required: bool,
            ) -> rocket_okapi::Result<RequestHeaderInput> {
                Ok(RequestHeaderInput::None)
            }
        }
    };
}

role_guard!(HirerGuard, UserRole::Hirer);
role_guard!(FixerGuard, UserRole::Fixer);
role_guard!(AdminGuard, UserRole::Admin);
