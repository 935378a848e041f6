use serde::Deserialize;

/// `data` payload of a successful `POST /api2/json/access/ticket`.
#[derive(Deserialize)]
pub struct LoginResponseData {
    pub ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    pub csrf_token: String,
    #[serde(default)]
    pub username: Option<String>,
}
