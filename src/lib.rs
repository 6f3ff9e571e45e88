//! Rotating proof-of-presence tokens for classroom attendance.
//!
//! A teacher's screen shows a QR code that changes every second. Each code is an
//! AES-256-GCM sealed `{lesson, timestamp}` under a short-lived session secret;
//! the server accepts it only while it is a few seconds old and only under the
//! teacher's current secret.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub mod client {
    pub mod api;
    pub mod http;
}

pub mod crypto {
    pub mod aes;
    pub mod secret;
}

pub mod models {
    pub mod attendance;
    pub mod principal;
    pub mod token;
}

pub mod protocol {
    pub mod generator;
    pub mod validator;
}

pub mod rotation {
    pub mod controller;
}

pub mod repositories {
    pub mod attempts;
    pub mod attendance;
    pub mod principal;
    pub mod secret;
}

pub mod services {
    pub mod attendance;
    pub mod session;
}

pub mod handlers {
    pub mod attendance;
    pub mod response;
    pub mod session;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod rate_limit;
}

pub mod validation {
    pub mod envelope;
}
