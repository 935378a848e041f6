pub mod api_response;
pub mod login_response;
