//! HTTP surface over one `Workflow`.
//!
//! A deliberately small server: blocking accept loop, one request per
//! connection, JSON in and out. The mobile clients are thin optimistic
//! updaters; every guard they rely on is enforced here, server-side.

use crate::config::ServiceConfig;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;
use thela_core::{Actor, ActorRole, PrepStatus, RefillStatus, ReleaseState};
use thela_flow::{
    AllocationError, CreateAssignment, CreatePrep, CreateRefill, PrepTransition, RefillTransition,
    TransitionError, Workflow,
};
use thela_store::CatalogError;
use thiserror::Error;
use tracing::{error, info};

const MAX_BODY_BYTES: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum HttpServeError {
    #[error("bind failed: {0}")]
    Bind(std::io::Error),
    #[error("accept failed: {0}")]
    Accept(std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn fail(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

/// One parsed request, independent of the transport so tests can drive the
/// service without sockets.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: String,
    pub target: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Healthz,
    Index,
    Foods,
    AdjustFood(String),
    Combos,
    CreateCombo,
    UpdateCombo(String),
    DeleteCombo(String),
    Resources,
    Assignments,
    CreateAssignment,
    CompleteAssignment(String),
    CancelAssignment(String),
    RefillRequests,
    CreateRefill,
    TransitionRefill(String),
    PrepRequests,
    CreatePrep,
    PatchPrep(String),
    DeletePrep(String),
    AdminRequestCount,
}

impl Route {
    /// Routes whose success mutates state worth flushing.
    fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Self::Healthz
                | Self::Index
                | Self::Foods
                | Self::Combos
                | Self::Resources
                | Self::Assignments
                | Self::RefillRequests
                | Self::PrepRequests
                | Self::AdminRequestCount
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
enum RouteError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },
}

/// The workflow plus the resolved token table and the flush target.
pub struct ApiService {
    workflow: Arc<Workflow>,
    tokens: BTreeMap<String, Actor>,
    data_dir: Option<PathBuf>,
}

impl ApiService {
    pub fn new(workflow: Arc<Workflow>, config: &ServiceConfig) -> Self {
        Self {
            workflow,
            tokens: config.actor_table(),
            data_dir: Some(config.data_dir.clone()),
        }
    }

    /// A service that never flushes snapshots (tests, demos).
    pub fn without_snapshots(workflow: Arc<Workflow>, tokens: BTreeMap<String, Actor>) -> Self {
        Self {
            workflow,
            tokens,
            data_dir: None,
        }
    }

    /// Answer one request.
    pub fn respond(&self, request: &ApiRequest) -> HttpResponse {
        let (path, query) = split_target(&request.target);
        let params = parse_query_params(query);

        let route = match parse_route(&request.method, path) {
            Ok(route) => route,
            Err(RouteError::BadRequest(msg)) => return HttpResponse::fail(400, msg),
            Err(RouteError::NotFound(msg)) => return HttpResponse::fail(404, msg),
            Err(err @ RouteError::MethodNotAllowed { .. }) => {
                return HttpResponse::fail(405, err.to_string());
            }
        };

        match route {
            Route::Healthz => return HttpResponse::ok(json!({ "ok": true })),
            Route::Index => return index_response(),
            _ => {}
        }
        let actor = match self.resolve_actor(request.bearer.as_deref()) {
            Ok(actor) => actor,
            Err(response) => return response,
        };

        let response = self.execute(&route, &actor, &params, request.body.as_ref());
        if route.is_mutation()
            && response.status == 200
            && let Some(dir) = &self.data_dir
            && let Err(err) = self.workflow.save(dir)
        {
            error!(data_dir = %dir.display(), %err, "failed to flush snapshots");
        }
        response
    }

    fn resolve_actor(&self, bearer: Option<&str>) -> Result<Actor, HttpResponse> {
        let token = bearer
            .ok_or_else(|| HttpResponse::fail(401, "missing bearer token"))?;
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| HttpResponse::fail(401, "unknown bearer token"))
    }

    fn execute(
        &self,
        route: &Route,
        actor: &Actor,
        params: &BTreeMap<String, String>,
        body: Option<&Value>,
    ) -> HttpResponse {
        match route {
            Route::Healthz => HttpResponse::ok(json!({ "ok": true })),
            Route::Index => index_response(),
            Route::Foods => to_json_response(&self.workflow.ledger().list()),
            Route::AdjustFood(item_id) => self.adjust_food(actor, item_id, body),
            Route::Combos => to_json_response(&self.workflow.catalog().list()),
            Route::CreateCombo => self.upsert_combo(actor, None, body),
            Route::UpdateCombo(combo_id) => self.upsert_combo(actor, Some(combo_id), body),
            Route::DeleteCombo(combo_id) => self.delete_combo(actor, combo_id),
            Route::Resources => to_json_response(&self.workflow.registry().list()),
            Route::Assignments => to_json_response(&self.workflow.assignments().list()),
            Route::CreateAssignment => self.create_assignment(actor, body),
            Route::CompleteAssignment(id) => self.complete_assignment(actor, id, body),
            Route::CancelAssignment(id) => match self.workflow.cancel_assignment(actor, id) {
                Ok(assignment) => to_json_response(&assignment),
                Err(err) => allocation_error_response(err),
            },
            Route::RefillRequests => self.list_refills(params),
            Route::CreateRefill => self.create_refill(actor, body),
            Route::TransitionRefill(id) => self.transition_refill(actor, id, body),
            Route::PrepRequests => self.list_preps(params),
            Route::CreatePrep => self.create_prep(actor, body),
            Route::PatchPrep(id) => self.patch_prep(actor, id, body),
            Route::DeletePrep(id) => self.delete_prep(actor, id),
            Route::AdminRequestCount => self.admin_request_count(actor),
        }
    }

    fn adjust_food(&self, actor: &Actor, item_id: &str, body: Option<&Value>) -> HttpResponse {
        if actor.role != ActorRole::SuperAdmin {
            return HttpResponse::fail(403, "only the super admin may adjust stock");
        }
        let Some(stock) = body.and_then(|b| body_u32(b, &["stock"])) else {
            return HttpResponse::fail(400, "missing non-negative integer field: stock");
        };
        match self.workflow.ledger().adjust_stock(item_id, stock) {
            Ok(item) => to_json_response(&item),
            Err(err) => HttpResponse::fail(404, err.to_string()),
        }
    }

    fn upsert_combo(
        &self,
        actor: &Actor,
        combo_id: Option<&str>,
        body: Option<&Value>,
    ) -> HttpResponse {
        if !matches!(actor.role, ActorRole::Supervisor | ActorRole::SuperAdmin) {
            return HttpResponse::fail(403, "only supervisors may edit the menu");
        }
        let Some(body) = body else {
            return HttpResponse::fail(400, "missing request body");
        };
        let mut combo: thela_core::Combo = match serde_json::from_value(body.clone()) {
            Ok(combo) => combo,
            Err(err) => return HttpResponse::fail(400, format!("invalid combo: {err}")),
        };
        if let Some(id) = combo_id {
            // PATCH target wins over any id carried in the body.
            combo.id = id.to_string();
        }
        if !thela_core::is_valid_id_token(&combo.id) {
            return HttpResponse::fail(400, format!("invalid combo id: {:?}", combo.id));
        }
        if combo.components.is_empty() {
            return HttpResponse::fail(400, "a combo needs at least one component");
        }
        if combo.components.iter().any(|c| c.quantity == 0) {
            return HttpResponse::fail(400, "combo component quantities must be positive");
        }
        self.workflow.catalog().upsert(combo.clone());
        to_json_response(&combo)
    }

    fn delete_combo(&self, actor: &Actor, combo_id: &str) -> HttpResponse {
        if !matches!(actor.role, ActorRole::Supervisor | ActorRole::SuperAdmin) {
            return HttpResponse::fail(403, "only supervisors may edit the menu");
        }
        match self.workflow.catalog().remove(combo_id) {
            Ok(removed) => to_json_response(&removed),
            Err(err @ CatalogError::UnknownCombo(_)) => HttpResponse::fail(404, err.to_string()),
            Err(err) => HttpResponse::fail(400, err.to_string()),
        }
    }

    fn create_assignment(&self, actor: &Actor, body: Option<&Value>) -> HttpResponse {
        let request: CreateAssignment = match parse_body(body) {
            Ok(request) => request,
            Err(response) => return response,
        };
        match self.workflow.create_assignment(actor, request) {
            Ok(assignment) => to_json_response(&assignment),
            Err(err) => allocation_error_response(err),
        }
    }

    fn complete_assignment(
        &self,
        actor: &Actor,
        assignment_id: &str,
        body: Option<&Value>,
    ) -> HttpResponse {
        let outcomes: BTreeMap<String, ReleaseState> = match body.and_then(|b| b.get("outcomes")) {
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(outcomes) => outcomes,
                Err(err) => {
                    return HttpResponse::fail(400, format!("invalid outcomes: {err}"));
                }
            },
            None => BTreeMap::new(),
        };
        match self
            .workflow
            .complete_assignment(actor, assignment_id, &outcomes)
        {
            Ok(assignment) => to_json_response(&assignment),
            Err(err) => allocation_error_response(err),
        }
    }

    fn list_refills(&self, params: &BTreeMap<String, String>) -> HttpResponse {
        let refills = if let Some(rider_id) = param(params, &["rider_id", "riderId"]) {
            self.workflow.refills_for_rider(rider_id)
        } else if let Some(coordinator_id) = param(params, &["coordinator_id", "coordinatorId"]) {
            self.workflow.refills_for_coordinator(coordinator_id)
        } else if param(params, &["pending"]).is_some() {
            self.workflow.pending_refills()
        } else {
            self.workflow.requests().refills()
        };
        to_json_response(&refills)
    }

    fn create_refill(&self, actor: &Actor, body: Option<&Value>) -> HttpResponse {
        let request: CreateRefill = match parse_body(body) {
            Ok(request) => request,
            Err(response) => return response,
        };
        match self.workflow.create_refill(actor, request) {
            Ok(refill) => to_json_response(&refill),
            Err(err) => transition_error_response(err),
        }
    }

    fn transition_refill(
        &self,
        actor: &Actor,
        request_id: &str,
        body: Option<&Value>,
    ) -> HttpResponse {
        let Some(body) = body else {
            return HttpResponse::fail(400, "missing request body");
        };
        let Some(status) = body_str(body, &["status"]) else {
            return HttpResponse::fail(400, "missing field: status");
        };
        let Some(target) = RefillStatus::parse(status) else {
            return HttpResponse::fail(400, format!("unknown refill status: {status:?}"));
        };
        let observed_status = match parse_observed(body, RefillStatus::parse) {
            Ok(observed) => observed,
            Err(response) => return response,
        };
        let transition = RefillTransition {
            request_id: request_id.to_string(),
            target,
            coordinator_id: body_str(body, &["coordinator_id", "coordinatorId"])
                .map(str::to_string),
            observed_status,
        };
        match self.workflow.transition_refill(actor, transition) {
            Ok(refill) => to_json_response(&refill),
            Err(err) => transition_error_response(err),
        }
    }

    fn list_preps(&self, params: &BTreeMap<String, String>) -> HttpResponse {
        let preps = match param(params, &["cook_id", "cookId"]) {
            Some(cook_id) => self.workflow.preps_for_cook(cook_id),
            None => self.workflow.requests().preps(),
        };
        to_json_response(&preps)
    }

    fn create_prep(&self, actor: &Actor, body: Option<&Value>) -> HttpResponse {
        let request: CreatePrep = match parse_body(body) {
            Ok(request) => request,
            Err(response) => return response,
        };
        match self.workflow.create_prep(actor, request) {
            Ok(prep) => to_json_response(&prep),
            Err(err) => transition_error_response(err),
        }
    }

    /// `PATCH /api/prep-requests/:id` applies a `{status}` or a
    /// `{quantityToPrepare}` mutation, never both at once.
    fn patch_prep(&self, actor: &Actor, request_id: &str, body: Option<&Value>) -> HttpResponse {
        let Some(body) = body else {
            return HttpResponse::fail(400, "missing request body");
        };
        let status = body_str(body, &["status"]);
        let quantity = body_u32(body, &["quantity_to_prepare", "quantityToPrepare"]);

        match (status, quantity) {
            (Some(_), Some(_)) => {
                HttpResponse::fail(400, "send either status or quantityToPrepare, not both")
            }
            (Some(status), None) => {
                let Some(target) = PrepStatus::parse(status) else {
                    return HttpResponse::fail(400, format!("unknown prep status: {status:?}"));
                };
                let observed_status = match parse_observed(body, PrepStatus::parse) {
                    Ok(observed) => observed,
                    Err(response) => return response,
                };
                let transition = PrepTransition {
                    request_id: request_id.to_string(),
                    target,
                    observed_status,
                };
                match self.workflow.transition_prep(actor, transition) {
                    Ok(prep) => to_json_response(&prep),
                    Err(err) => transition_error_response(err),
                }
            }
            (None, Some(quantity)) => {
                match self.workflow.set_prep_quantity(actor, request_id, quantity) {
                    Ok(prep) => to_json_response(&prep),
                    Err(err) => transition_error_response(err),
                }
            }
            (None, None) => {
                HttpResponse::fail(400, "missing field: status or quantityToPrepare")
            }
        }
    }

    /// `DELETE` is the wire form of the `picked` consume.
    fn delete_prep(&self, actor: &Actor, request_id: &str) -> HttpResponse {
        let transition = PrepTransition {
            request_id: request_id.to_string(),
            target: PrepStatus::Picked,
            observed_status: None,
        };
        match self.workflow.transition_prep(actor, transition) {
            Ok(prep) => to_json_response(&prep),
            Err(err) => transition_error_response(err),
        }
    }

    fn admin_request_count(&self, actor: &Actor) -> HttpResponse {
        if actor.role != ActorRole::SuperAdmin {
            return HttpResponse::fail(403, "only the super admin may read approval counters");
        }
        to_json_response(&self.workflow.pending_counts())
    }
}

fn index_response() -> HttpResponse {
    HttpResponse::ok(json!({
        "service": "thela.workflow.v1",
        "routes": [
            "/healthz",
            "/api/foods",
            "/api/combos",
            "/api/resources",
            "/api/assignments",
            "/api/refill-requests",
            "/api/prep-requests?cookId=<cook_id>",
            "/api/admin/requests/count"
        ]
    }))
}

fn parse_body<T: serde::de::DeserializeOwned>(body: Option<&Value>) -> Result<T, HttpResponse> {
    let body = body.ok_or_else(|| HttpResponse::fail(400, "missing request body"))?;
    serde_json::from_value(body.clone())
        .map_err(|err| HttpResponse::fail(400, format!("invalid request body: {err}")))
}

fn parse_observed<S>(
    body: &Value,
    parse: impl Fn(&str) -> Option<S>,
) -> Result<Option<S>, HttpResponse> {
    match body_str(body, &["observed_status", "observedStatus"]) {
        None => Ok(None),
        Some(raw) => parse(raw).map(Some).ok_or_else(|| {
            HttpResponse::fail(400, format!("unknown observed status: {raw:?}"))
        }),
    }
}

fn to_json_response<T: serde::Serialize>(value: &T) -> HttpResponse {
    match serde_json::to_value(value) {
        Ok(body) => HttpResponse::ok(body),
        Err(err) => HttpResponse::fail(500, format!("serialization failed: {err}")),
    }
}

fn allocation_error_response(err: AllocationError) -> HttpResponse {
    let status = match &err {
        AllocationError::Validation(_)
        | AllocationError::WrongKind { .. }
        | AllocationError::UnknownOutcomeResource { .. }
        | AllocationError::Catalog(CatalogError::EmptyCombo { .. }) => 400,
        AllocationError::UnknownResource(_)
        | AllocationError::UnknownItem(_)
        | AllocationError::NotFound(_)
        | AllocationError::Catalog(CatalogError::UnknownCombo(_)) => 404,
        AllocationError::RoleNotPermitted { .. } => 403,
        AllocationError::ResourceContention { .. }
        | AllocationError::ResourceUnavailable { .. }
        | AllocationError::InsufficientStock { .. }
        | AllocationError::AlreadyCompleted(_) => 409,
    };
    HttpResponse::fail(status, err.to_string())
}

fn transition_error_response(err: TransitionError) -> HttpResponse {
    let status = match &err {
        TransitionError::NotFound(_) | TransitionError::UnknownItem(_) => 404,
        TransitionError::Validation(_) => 400,
        TransitionError::RoleNotPermitted { .. } => 403,
        TransitionError::IllegalTransition { .. }
        | TransitionError::AlreadyTerminal { .. }
        | TransitionError::StaleState { .. } => 409,
        TransitionError::Ledger(_) => 500,
    };
    HttpResponse::fail(status, err.to_string())
}

fn parse_route(method: &str, path: &str) -> Result<Route, RouteError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let route = match (method, segments.as_slice()) {
        ("GET", []) => Some(Route::Index),
        ("GET", ["healthz"]) => Some(Route::Healthz),
        ("GET", ["api", "foods"]) => Some(Route::Foods),
        ("PATCH", ["api", "foods", id]) => Some(Route::AdjustFood(decode_segment(id)?)),
        ("GET", ["api", "combos"]) => Some(Route::Combos),
        ("POST", ["api", "combos"]) => Some(Route::CreateCombo),
        ("PATCH", ["api", "combos", id]) => Some(Route::UpdateCombo(decode_segment(id)?)),
        ("DELETE", ["api", "combos", id]) => Some(Route::DeleteCombo(decode_segment(id)?)),
        ("GET", ["api", "resources"]) => Some(Route::Resources),
        ("GET", ["api", "assignments"]) => Some(Route::Assignments),
        ("POST", ["api", "assignments"]) => Some(Route::CreateAssignment),
        ("POST", ["api", "assignments", id, "complete"]) => {
            Some(Route::CompleteAssignment(decode_segment(id)?))
        }
        ("POST", ["api", "assignments", id, "cancel"]) => {
            Some(Route::CancelAssignment(decode_segment(id)?))
        }
        ("GET", ["api", "refill-requests"]) => Some(Route::RefillRequests),
        ("POST", ["api", "refill-requests"]) => Some(Route::CreateRefill),
        ("PATCH", ["api", "refill-requests", id]) => {
            Some(Route::TransitionRefill(decode_segment(id)?))
        }
        ("GET", ["api", "prep-requests"]) => Some(Route::PrepRequests),
        ("POST", ["api", "prep-requests"]) => Some(Route::CreatePrep),
        ("PATCH", ["api", "prep-requests", id]) => Some(Route::PatchPrep(decode_segment(id)?)),
        ("DELETE", ["api", "prep-requests", id]) => Some(Route::DeletePrep(decode_segment(id)?)),
        ("GET", ["api", "admin", "requests", "count"]) => Some(Route::AdminRequestCount),
        _ => None,
    };
    if let Some(route) = route {
        return Ok(route);
    }

    // Distinguish a wrong method on a known path from an unknown path.
    let known_path = matches!(
        segments.as_slice(),
        []
            | ["healthz"]
            | ["api", "foods"]
            | ["api", "foods", _]
            | ["api", "combos"]
            | ["api", "combos", _]
            | ["api", "resources"]
            | ["api", "assignments"]
            | ["api", "assignments", _, "complete"]
            | ["api", "assignments", _, "cancel"]
            | ["api", "refill-requests"]
            | ["api", "refill-requests", _]
            | ["api", "prep-requests"]
            | ["api", "prep-requests", _]
            | ["api", "admin", "requests", "count"]
    );
    if known_path {
        Err(RouteError::MethodNotAllowed {
            method: method.to_string(),
            path: path.to_string(),
        })
    } else {
        Err(RouteError::NotFound(format!("unknown route: {path}")))
    }
}

fn decode_segment(segment: &str) -> Result<String, RouteError> {
    let decoded = percent_decode(segment);
    if decoded.is_empty() {
        return Err(RouteError::BadRequest("empty path segment".to_string()));
    }
    Ok(decoded)
}

fn param<'a>(params: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| params.get(*key))
        .map(String::as_str)
}

fn body_str<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| body.get(key)).and_then(Value::as_str)
}

fn body_u32(body: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .find_map(|key| body.get(key))
        .and_then(Value::as_u64)
        .and_then(|value| u32::try_from(value).ok())
}

/// Serve forever on `bind`.
pub fn serve(service: ApiService, bind: SocketAddr) -> Result<(), HttpServeError> {
    serve_with_limit(service, bind, None)
}

fn serve_with_limit(
    service: ApiService,
    bind: SocketAddr,
    max_requests: Option<usize>,
) -> Result<(), HttpServeError> {
    let listener = TcpListener::bind(bind).map_err(HttpServeError::Bind)?;
    info!(%bind, "thela api listening");
    let mut served = 0usize;

    for stream in listener.incoming() {
        if let Some(limit) = max_requests
            && served >= limit
        {
            break;
        }

        match stream {
            Ok(mut stream) => {
                if let Err(err) = handle_connection(&service, &mut stream) {
                    error!(%err, "request handling failed");
                    let _ = write_json_response(
                        &mut stream,
                        HttpResponse::fail(500, format!("internal server error: {err}")),
                    );
                }
                served += 1;
            }
            Err(err) => return Err(HttpServeError::Accept(err)),
        }
    }

    Ok(())
}

fn handle_connection(service: &ApiService, stream: &mut TcpStream) -> Result<(), String> {
    let request = read_request(stream).map_err(|e| e.to_string())?;
    let response = service.respond(&request);
    write_json_response(stream, response).map_err(|e| e.to_string())
}

fn read_request(stream: &mut TcpStream) -> Result<ApiRequest, RouteError> {
    let clone = stream
        .try_clone()
        .map_err(|e| RouteError::BadRequest(format!("failed to clone stream: {e}")))?;
    let mut reader = BufReader::new(clone);

    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .map_err(|e| RouteError::BadRequest(format!("failed to read request: {e}")))?;
    let (method, target) = parse_request_line(request_line.trim_end())?;

    let mut bearer = None;
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .map_err(|e| RouteError::BadRequest(format!("failed to read headers: {e}")))?;
        let line = line.trim_end();
        if read == 0 || line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            match name.to_ascii_lowercase().as_str() {
                "authorization" => {
                    bearer = value
                        .strip_prefix("Bearer ")
                        .or_else(|| value.strip_prefix("bearer "))
                        .map(str::to_string);
                }
                "content-length" => {
                    content_length = value.parse::<usize>().map_err(|_| {
                        RouteError::BadRequest(format!("invalid content-length: {value:?}"))
                    })?;
                }
                _ => {}
            }
        }
    }

    if content_length > MAX_BODY_BYTES {
        return Err(RouteError::BadRequest(format!(
            "request body too large: {content_length} bytes"
        )));
    }

    let body = if content_length > 0 {
        let mut buf = vec![0u8; content_length];
        reader
            .read_exact(&mut buf)
            .map_err(|e| RouteError::BadRequest(format!("failed to read body: {e}")))?;
        let parsed: Value = serde_json::from_slice(&buf)
            .map_err(|e| RouteError::BadRequest(format!("invalid JSON body: {e}")))?;
        Some(parsed)
    } else {
        None
    };

    Ok(ApiRequest {
        method,
        target,
        bearer,
        body,
    })
}

fn parse_request_line(line: &str) -> Result<(String, String), RouteError> {
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| RouteError::BadRequest("missing method".to_string()))?;
    let target = parts
        .next()
        .ok_or_else(|| RouteError::BadRequest("missing target".to_string()))?;
    Ok((method.to_string(), target.to_string()))
}

fn split_target(target: &str) -> (&str, &str) {
    match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    }
}

fn parse_query_params(query: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (k, v) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        let key = percent_decode(k);
        if key.is_empty() {
            continue;
        }
        out.insert(key, percent_decode(v));
    }
    out
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                if let (Some(h), Some(l)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                    out.push((h * 16 + l) as char);
                    i += 3;
                } else {
                    out.push('%');
                    i += 1;
                }
            }
            ch => {
                out.push(ch as char);
                i += 1;
            }
        }
    }
    out
}

fn hex_val(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

fn write_json_response(stream: &mut TcpStream, response: HttpResponse) -> std::io::Result<()> {
    let body = serde_json::to_vec_pretty(&response.body)?;
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nAccess-Control-Allow-Origin: *\r\nConnection: close\r\n\r\n",
        response.status,
        reason_phrase(response.status),
        body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(&body)?;
    stream.flush()
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thela_core::{FoodItem, Resource, ResourceKind};

    fn seeded_service() -> ApiService {
        let workflow = Workflow::in_memory();
        for (id, kind) in [
            ("r1", ResourceKind::Rider),
            ("v1", ResourceKind::Vehicle),
            ("b1", ResourceKind::Battery),
            ("rt1", ResourceKind::Route),
        ] {
            workflow.registry().register(Resource::new(id, kind, ""));
        }
        workflow
            .ledger()
            .upsert_item(FoodItem::new("chai", "Chai", "cups").with_stock(10));

        let mut tokens = BTreeMap::new();
        tokens.insert(
            "tok-rider".to_string(),
            Actor::new("r1", ActorRole::Rider),
        );
        tokens.insert(
            "tok-sup".to_string(),
            Actor::new("sup-1", ActorRole::Supervisor),
        );
        tokens.insert(
            "tok-cook".to_string(),
            Actor::new("cook-1", ActorRole::Cook),
        );
        tokens.insert(
            "tok-admin".to_string(),
            Actor::new("admin", ActorRole::SuperAdmin),
        );
        ApiService::without_snapshots(Arc::new(workflow), tokens)
    }

    fn request(method: &str, target: &str, token: Option<&str>, body: Option<Value>) -> ApiRequest {
        ApiRequest {
            method: method.to_string(),
            target: target.to_string(),
            bearer: token.map(str::to_string),
            body,
        }
    }

    #[test]
    fn healthz_needs_no_token() {
        let service = seeded_service();
        let response = service.respond(&request("GET", "/healthz", None, None));
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({ "ok": true }));
    }

    #[test]
    fn api_routes_reject_missing_and_unknown_tokens() {
        let service = seeded_service();
        let response = service.respond(&request("GET", "/api/foods", None, None));
        assert_eq!(response.status, 401);

        let response = service.respond(&request("GET", "/api/foods", Some("tok-stale"), None));
        assert_eq!(response.status, 401);
    }

    #[test]
    fn wrong_method_on_a_known_path_is_405() {
        let service = seeded_service();
        let response = service.respond(&request("PUT", "/api/foods", Some("tok-sup"), None));
        assert_eq!(response.status, 405);

        let response = service.respond(&request("GET", "/api/nowhere", Some("tok-sup"), None));
        assert_eq!(response.status, 404);
    }

    #[test]
    fn assignment_round_trip_over_the_wire_shapes() {
        let service = seeded_service();
        let body = json!({
            "rider_id": "r1",
            "vehicle_id": "v1",
            "battery_id": "b1",
            "route_id": "rt1",
            "items": [{ "food_item_id": "chai", "quantity": 7 }]
        });
        let response = service.respond(&request(
            "POST",
            "/api/assignments",
            Some("tok-sup"),
            Some(body),
        ));
        assert_eq!(response.status, 200);
        assert_eq!(response.body["status"], "active");

        let foods = service.respond(&request("GET", "/api/foods", Some("tok-rider"), None));
        assert_eq!(foods.body[0]["stock"], 3);

        // A second allocation naming the same vehicle conflicts.
        let retry = service.respond(&request(
            "POST",
            "/api/assignments",
            Some("tok-sup"),
            Some(json!({
                "rider_id": "r1",
                "vehicle_id": "v1",
                "battery_id": "b1",
                "route_id": "rt1"
            })),
        ));
        assert_eq!(retry.status, 409);
    }

    #[test]
    fn insufficient_stock_maps_to_conflict() {
        let service = seeded_service();
        let response = service.respond(&request(
            "POST",
            "/api/assignments",
            Some("tok-sup"),
            Some(json!({
                "rider_id": "r1",
                "vehicle_id": "v1",
                "battery_id": "b1",
                "route_id": "rt1",
                "items": [{ "food_item_id": "chai", "quantity": 99 }]
            })),
        ));
        assert_eq!(response.status, 409);

        let resources = service.respond(&request("GET", "/api/resources", Some("tok-sup"), None));
        for resource in resources.body.as_array().expect("resources should list") {
            assert_eq!(resource["availability"], "available");
        }
    }

    #[test]
    fn refill_lifecycle_over_patch_with_camel_case_aliases() {
        let service = seeded_service();
        let created = service.respond(&request(
            "POST",
            "/api/refill-requests",
            Some("tok-rider"),
            Some(json!({ "item_id": "chai", "quantity": 5 })),
        ));
        assert_eq!(created.status, 200);
        let id = created.body["id"].as_str().expect("id should be set").to_string();

        let forwarded = service.respond(&request(
            "PATCH",
            &format!("/api/refill-requests/{id}"),
            Some("tok-sup"),
            Some(json!({ "status": "forwarded", "coordinatorId": "c1" })),
        ));
        assert_eq!(forwarded.status, 200);
        assert_eq!(forwarded.body["assigned_coordinator_id"], "c1");

        // A stale observed status is a conflict, not an overwrite.
        let stale = service.respond(&request(
            "PATCH",
            &format!("/api/refill-requests/{id}"),
            Some("tok-sup"),
            Some(json!({ "status": "rejected", "observedStatus": "pending" })),
        ));
        assert_eq!(stale.status, 409);
    }

    #[test]
    fn prep_patch_takes_one_mutation_at_a_time() {
        let service = seeded_service();
        let created = service.respond(&request(
            "POST",
            "/api/prep-requests",
            Some("tok-sup"),
            Some(json!({
                "cook_id": "cook-1",
                "food_item_id": "chai",
                "quantity_to_prepare": 30
            })),
        ));
        assert_eq!(created.status, 200);
        let id = created.body["id"].as_str().expect("id should be set").to_string();

        let both = service.respond(&request(
            "PATCH",
            &format!("/api/prep-requests/{id}"),
            Some("tok-cook"),
            Some(json!({ "status": "ready", "quantityToPrepare": 10 })),
        ));
        assert_eq!(both.status, 400);

        let edited = service.respond(&request(
            "PATCH",
            &format!("/api/prep-requests/{id}"),
            Some("tok-cook"),
            Some(json!({ "quantityToPrepare": 10 })),
        ));
        assert_eq!(edited.status, 200);
        assert_eq!(edited.body["quantity_to_prepare"], 10);

        let ready = service.respond(&request(
            "PATCH",
            &format!("/api/prep-requests/{id}"),
            Some("tok-cook"),
            Some(json!({ "status": "ready" })),
        ));
        assert_eq!(ready.status, 200);

        let deleted = service.respond(&request(
            "DELETE",
            &format!("/api/prep-requests/{id}"),
            Some("tok-cook"),
            None,
        ));
        assert_eq!(deleted.status, 200);

        // Consumed: later edits answer already-terminal.
        let after = service.respond(&request(
            "PATCH",
            &format!("/api/prep-requests/{id}"),
            Some("tok-cook"),
            Some(json!({ "quantityToPrepare": 5 })),
        ));
        assert_eq!(after.status, 409);
    }

    #[test]
    fn prep_list_filters_by_cook() {
        let service = seeded_service();
        for cook in ["cook-1", "cook-2"] {
            let response = service.respond(&request(
                "POST",
                "/api/prep-requests",
                Some("tok-sup"),
                Some(json!({
                    "cook_id": cook,
                    "food_item_id": "chai",
                    "quantity_to_prepare": 10
                })),
            ));
            assert_eq!(response.status, 200);
        }

        let listed = service.respond(&request(
            "GET",
            "/api/prep-requests?cookId=cook-1",
            Some("tok-cook"),
            None,
        ));
        let rows = listed.body.as_array().expect("preps should list");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["cook_id"], "cook-1");
    }

    #[test]
    fn admin_counter_is_gated_to_the_super_admin() {
        let service = seeded_service();
        let denied = service.respond(&request(
            "GET",
            "/api/admin/requests/count",
            Some("tok-rider"),
            None,
        ));
        assert_eq!(denied.status, 403);

        service.respond(&request(
            "POST",
            "/api/refill-requests",
            Some("tok-rider"),
            Some(json!({ "item_id": "chai", "quantity": 2 })),
        ));
        let counted = service.respond(&request(
            "GET",
            "/api/admin/requests/count",
            Some("tok-admin"),
            None,
        ));
        assert_eq!(counted.status, 200);
        assert_eq!(counted.body, json!({ "pending_refills": 1, "queued_preps": 0 }));
    }

    #[test]
    fn stock_adjustment_is_gated_and_applied() {
        let service = seeded_service();
        let denied = service.respond(&request(
            "PATCH",
            "/api/foods/chai",
            Some("tok-sup"),
            Some(json!({ "stock": 25 })),
        ));
        assert_eq!(denied.status, 403);

        let adjusted = service.respond(&request(
            "PATCH",
            "/api/foods/chai",
            Some("tok-admin"),
            Some(json!({ "stock": 25 })),
        ));
        assert_eq!(adjusted.status, 200);
        assert_eq!(adjusted.body["stock"], 25);
    }

    #[test]
    fn combo_crud_round_trips() {
        let service = seeded_service();
        let combo = json!({
            "id": "combo-breakfast",
            "name": "Breakfast",
            "components": [{ "food_item_id": "chai", "quantity": 1 }]
        });
        let created = service.respond(&request(
            "POST",
            "/api/combos",
            Some("tok-sup"),
            Some(combo),
        ));
        assert_eq!(created.status, 200);

        let listed = service.respond(&request("GET", "/api/combos", Some("tok-sup"), None));
        assert_eq!(listed.body.as_array().expect("combos should list").len(), 1);

        let deleted = service.respond(&request(
            "DELETE",
            "/api/combos/combo-breakfast",
            Some("tok-sup"),
            None,
        ));
        assert_eq!(deleted.status, 200);

        let missing = service.respond(&request(
            "DELETE",
            "/api/combos/combo-breakfast",
            Some("tok-sup"),
            None,
        ));
        assert_eq!(missing.status, 404);
    }
}
