pub mod dispatch;
pub mod response;

pub use dispatch::dispatch_middleware;
pub use response::ApiResponse;
