use chrono::Local;
use serde::Serialize;

const RETRIEVAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A row of the `routes` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    pub id: i64,
    pub route_name: String,
    pub route_link: String,
}

/// List-all projection of a route, without scraped content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub id: i64,
    pub route_name: String,
    pub link: String,
}

impl From<RouteRecord> for RouteSummary {
    fn from(r: RouteRecord) -> Self {
        Self {
            id: r.id,
            route_name: r.route_name,
            link: r.route_link,
        }
    }
}

/// A stored route joined with content scraped from its page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteData {
    pub id: i64,
    pub route_name: String,
    pub link: String,
    pub description: String,
    pub images: Vec<String>,
}

impl RouteData {
    /// Record whose page could not be fetched.
    pub fn unfetched(record: RouteRecord) -> Self {
        Self {
            id: record.id,
            route_name: record.route_name,
            link: record.route_link,
            description: String::new(),
            images: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    NotFound,
}

/// Response wrapper. `data` is present exactly when `status` is `Success`;
/// the constructors are the only way to build one.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    status: Status,
    message: String,
    data: Option<T>,
    retrieval_time: String,
}

impl<T> Envelope<T> {
    pub fn found(message: impl Into<String>, data: T) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            data: Some(data),
            retrieval_time: now(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: Status::NotFound,
            message: message.into(),
            data: None,
            retrieval_time: now(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }
}

fn now() -> String {
    Local::now().format(RETRIEVAL_TIME_FORMAT).to_string()
}
