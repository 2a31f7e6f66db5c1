//! A scripted [`Transport`], so that tests can describe how OSM answers without a server
#![cfg(test)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{ApiRequest, HttpResponse};
use crate::error::TransportFailure;
use crate::traits::Transport;

type Scripted = Result<HttpResponse, String>;

struct Route {
    /// Matches any request whose URL contains this
    fragment: String,
    /// Answers are consumed in order. The last one is repeated forever
    answers: VecDeque<Scripted>,
}

/// Requests are matched against routes in the order the routes were added
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `response` to every request whose URL contains `fragment`
    pub fn on(self, fragment: &str, response: HttpResponse) -> Self {
        self.script(fragment, vec![Ok(response)])
    }

    /// Answer the given responses in turn, the last one being repeated
    pub fn on_sequence(self, fragment: &str, responses: Vec<HttpResponse>) -> Self {
        self.script(fragment, responses.into_iter().map(Ok).collect())
    }

    /// Fail every request whose URL contains `fragment`, as if the network was down
    pub fn fail(self, fragment: &str, reason: &str) -> Self {
        self.script(fragment, vec![Err(reason.to_string())])
    }

    fn script(self, fragment: &str, answers: Vec<Scripted>) -> Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(Route { fragment: fragment.to_string(), answers: answers.into() });
        }
        self
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// How many requests had a URL containing `fragment`
    pub fn count(&self, fragment: &str) -> usize {
        self.requests.lock().unwrap()
            .iter()
            .filter(|r| r.url.as_str().contains(fragment))
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(&self, request: &ApiRequest) -> Result<HttpResponse, TransportFailure> {
        self.requests.lock().unwrap().push(request.clone());

        let mut routes = self.routes.lock().unwrap();
        let route = match routes.iter_mut().find(|r| request.url.as_str().contains(&r.fragment)) {
            None => {
                log::debug!("Mock transport: no route for {}", request.url);
                return Ok(HttpResponse::ok("no route").with_status(404));
            },
            Some(r) => r,
        };

        let answer = if route.answers.len() > 1 {
            route.answers.pop_front()
        } else {
            route.answers.front().cloned()
        };
        match answer {
            Some(Ok(response)) => Ok(response),
            Some(Err(reason)) => Err(TransportFailure::Unavailable(reason)),
            None => Ok(HttpResponse::ok("no answer").with_status(404)),
        }
    }
}
