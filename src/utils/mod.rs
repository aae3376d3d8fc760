pub mod api_response;
pub mod events;
pub mod notification;
