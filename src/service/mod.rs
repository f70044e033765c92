//! Request/reply facade in front of the [`Gateway`].
//!
//! Every request gets a reply carrying an explicit error code; gateway errors
//! never tear down the connection or the process.

use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use tracing::debug;

use crate::gateway::{Gateway, GatewayError, Uid};

// -----------------------------------------------------------------------------
// ----- ErrorCode -------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    ErrorJson = 1001,
    RpcGetFailed = 1010,
    UidInvalid = 1012,
    TokenInvalid = 1013,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl From<&GatewayError> for ErrorCode {
    fn from(err: &GatewayError) -> Self {
        match err {
            GatewayError::UnknownUser { .. } => ErrorCode::UidInvalid,
            GatewayError::TokenMismatch { .. } => ErrorCode::TokenInvalid,
            GatewayError::NoServersAvailable | GatewayError::DuplicateServer { .. } => {
                ErrorCode::RpcGetFailed
            }
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

// -----------------------------------------------------------------------------
// ----- Requests --------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method")]
pub enum Request {
    GetChatServer(GetChatServerRequest),
    Login(LoginRequest),
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetChatServerRequest {
    pub uid: Uid,
}

#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    pub uid: Uid,
    pub token: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("uid", &self.uid)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// ----- Responses -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetChatServerResponse {
    pub error: ErrorCode,
    pub host: String,
    pub port: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResponse {
    pub error: ErrorCode,
    pub uid: Uid,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    GetChatServer(GetChatServerResponse),
    Login(LoginResponse),
    Error(ErrorResponse),
}

impl Response {
    pub fn error(&self) -> ErrorCode {
        match self {
            Response::GetChatServer(r) => r.error,
            Response::Login(r) => r.error,
            Response::Error(r) => r.error,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- StatusService ---------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StatusService {
    gateway: Arc<Gateway>,
}

impl StatusService {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn get_chat_server(&self, request: GetChatServerRequest) -> GetChatServerResponse {
        match self.gateway.issue_and_bind(request.uid) {
            Ok(assignment) => GetChatServerResponse {
                error: ErrorCode::Success,
                host: assignment.server.host,
                port: assignment.server.port,
                token: assignment.token,
            },
            Err(err) => {
                debug!("GetChatServer for uid {} failed: {err}", request.uid);
                GetChatServerResponse {
                    error: ErrorCode::from(&err),
                    host: String::new(),
                    port: String::new(),
                    token: String::new(),
                }
            }
        }
    }

    pub fn login(&self, request: LoginRequest) -> LoginResponse {
        match self.gateway.validate_login(request.uid, &request.token) {
            Ok(session) => LoginResponse {
                error: ErrorCode::Success,
                uid: session.uid,
                token: session.token,
            },
            Err(err) => {
                debug!("Login for uid {} failed: {err}", request.uid);
                LoginResponse {
                    error: ErrorCode::from(&err),
                    uid: request.uid,
                    token: String::new(),
                }
            }
        }
    }

    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::GetChatServer(req) => Response::GetChatServer(self.get_chat_server(req)),
            Request::Login(req) => Response::Login(self.login(req)),
        }
    }

    /// Decodes one wire line and answers it. Malformed input is answered with
    /// `ErrorJson`.
    pub fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                debug!("request {request:?}");
                self.handle(request)
            }
            Err(err) => {
                debug!("malformed request: {err}");
                Response::Error(ErrorResponse {
                    error: ErrorCode::ErrorJson,
                })
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
