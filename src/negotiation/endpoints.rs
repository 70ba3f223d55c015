//! Ordered candidate generation routes

/// Full generation URLs in the order they are tried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSelector {
    endpoints: Vec<String>,
}

impl EndpointSelector {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self { endpoints }
    }

    /// Join each route onto the server address
    pub fn from_routes(server_address: &str, routes: &[String]) -> Self {
        let endpoints = routes
            .iter()
            .map(|route| join_route(server_address, route))
            .collect();
        Self { endpoints }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Join a server address and a route with exactly one `/` between them
pub(crate) fn join_route(server_address: &str, route: &str) -> String {
    let base = server_address.trim_end_matches('/');
    if route.starts_with('/') {
        format!("{}{}", base, route)
    } else {
        format!("{}/{}", base, route)
    }
}
