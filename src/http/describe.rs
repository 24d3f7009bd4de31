//! Request description handler.
//!
//! Renders what the ingress layer made of a request as JSON. Registered for
//! every entry point by default, so the service can run standalone and the
//! `route-inspect` tool can show routing decisions offline.

use std::net::IpAddr;

use serde::Serialize;

use crate::error::RequestError;
use crate::http::origin::Protocol;
use crate::http::query::ParamMap;
use crate::http::request::WebRequest;
use crate::routing::dispatch::EntryPointHandler;

/// Everything the ingress layer derived from one request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestDescription {
    pub request_id: String,
    pub method: String,
    pub entry_point: String,
    pub subpath: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bad_path: Option<String>,
    pub params: ParamMap,
    pub query: ParamMap,
    pub ip: IpAddr,
    pub protocol: Protocol,
    pub server: String,
    pub accept_language: Vec<(String, f64)>,
}

/// Describe `request`. Resolves the client IP if not already done.
pub fn describe(request: &WebRequest) -> Result<RequestDescription, RequestError> {
    let params = request.params();

    Ok(RequestDescription {
        request_id: request.request_id().to_string(),
        method: request.method().to_string(),
        entry_point: request.entry_point().to_string(),
        subpath: request.entry_point_subpath().to_string(),
        bad_path: request.bad_path().map(str::to_string),
        params: params.values(&[]),
        query: params.query_values().clone(),
        ip: request.ip()?,
        protocol: request.protocol(),
        server: request.server(),
        accept_language: request.accept_lang(),
    })
}

/// Writes a [`RequestDescription`] as the response body.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescribeHandler;

impl EntryPointHandler for DescribeHandler {
    fn handle(&self, request: &mut WebRequest) -> Result<(), RequestError> {
        let description = describe(request)?;
        let body = serde_json::to_vec_pretty(&description).unwrap_or_default();

        // A title from the query string still identifies a page.
        let not_found = description.bad_path.is_some()
            && request.entry_point() == request.site().entry_points().default_name()
            && !request.params().get_check("title");
        let cross_origin = request.entry_point() == "rest"
            && request.site().config().rest.allow_cross_origin;
        let response = request.response_mut();
        if not_found {
            response.status_header(404);
        }
        response.header("Content-Type: application/json; charset=utf-8", true, None);
        if cross_origin {
            response.header("Access-Control-Allow-Origin: *", true, None);
        }
        response.write(&body);
        Ok(())
    }
}
