#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok = 200,
    NoContent = 204,

    MovedPermanently = 301,
    Found = 302,
    NotModified = 304,

    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,

    InternalServerError = 500,
    ServiceUnavailable = 503,
}

impl HttpStatus {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn reason(self) -> &'static str {
        match self {
            HttpStatus::Ok => "OK",                                       // 200
            HttpStatus::NoContent => "No Content",                        // 204
            HttpStatus::MovedPermanently => "Moved Permanently",          // 301
            HttpStatus::Found => "Found",                                 // 302
            HttpStatus::NotModified => "Not Modified",                    // 304
            HttpStatus::BadRequest => "Bad Request",                      // 400
            HttpStatus::Unauthorized => "Unauthorized",                   // 401
            HttpStatus::Forbidden => "Forbidden",                         // 403
            HttpStatus::NotFound => "Not Found",                          // 404
            HttpStatus::MethodNotAllowed => "Method Not Allowed",         // 405
            HttpStatus::InternalServerError => "Internal Server Error",   // 500
            HttpStatus::ServiceUnavailable => "Service Unavailable",      // 503
        }
    }

    /// `<code> <reason>`, the form stored in [`Response`](crate::http::response::Response).
    pub fn status_line(self) -> String {
        format!("{} {}", self.code(), self.reason())
    }
}
