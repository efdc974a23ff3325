use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;
use uuid::Uuid;

pub const DEVICE_COOKIE: &str = "eon_device";

/// The browser profile a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId(pub Uuid);

/// Read the device cookie, or mint one for a first visit.
pub async fn device_cookie(jar: CookieJar, mut req: Request, next: Next) -> Response {
    let known = jar
        .get(DEVICE_COOKIE)
        .and_then(|c| c.value().parse::<Uuid>().ok());

    let device_id = known.unwrap_or_else(Uuid::new_v4);
    req.extensions_mut().insert(DeviceId(device_id));
    let response = next.run(req).await;

    if known.is_some() {
        return response;
    }

    debug!("Issued device cookie {}", device_id);
    let cookie = Cookie::build((DEVICE_COOKIE, device_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .permanent()
        .build();
    (jar.add(cookie), response).into_response()
}
