use rocket::request::{self, FromRequest, Request, Outcome};
use rocket::http::Status;
use mongodb::bson::oid::ObjectId;

use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use rocket_okapi::r#gen::OpenApiGenerator;

use crate::models::UserRole;

/// Bearer-token authentication. Carries the role claimed by the token;
/// role guards re-check it against the stored account.
pub struct AuthGuard {
    pub user_id: ObjectId,
    pub role: UserRole,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = match req.headers().get_one("Authorization") {
            Some(header) => header.trim_start_matches("Bearer ").trim(),
            None => return Outcome::Error((Status::Unauthorized, ())),
        };

        match crate::services::JwtService::verify_token(token) {
            Ok(claims) => match ObjectId::parse_str(&claims.sub) {
                Ok(user_id) => Outcome::Success(AuthGuard {
                    user_id,
                    role: claims.role,
                }),
                Err(_) => Outcome::Error((Status::Unauthorized, ())),
            },
            Err(e) => {
                debug!("Rejected bearer token: {}", e);
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for AuthGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}

/// Authentication that never fails: anonymous callers and bad tokens
/// both come through as `None`.
pub struct Viewer(pub Option<AuthGuard>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Viewer {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.guard::<AuthGuard>().await {
            Outcome::Success(auth) => Outcome::Success(Viewer(Some(auth))),
            _ => Outcome::Success(Viewer(None)),
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for Viewer {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
