//! Tamper-evident session cookies.
//!
//! A session travels as two cookies: the payload (JSON token set) and a
//! `<name>.sig` cookie carrying an HMAC-SHA256 tag over that payload.

mod session;
mod sign;

pub use session::{
    AuthCookieOptions, CookieOptions, auth_cookies, cookies_from_header,
    parse_tokens_from_cookies, refresh_auth_cookies, remove_auth_cookies, set_auth_cookies,
    session_from_cookies, set_cookie_headers, to_signed_cookies,
};
pub use sign::{RawCookie, SignedCookies, SigningKeys, sign, signature_cookie_name, unsign, unsign_from};
