use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{authz, errors, models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::auth::send_otp,
		routes::auth::verify_otp,
		routes::auth::refresh,
		routes::auth::me,
		routes::auth::logout,
		routes::health::health,
		routes::authz::route_access,
		routes::authz::catalog,
		routes::group_roles::list_permissions,
		routes::group_roles::list_group_roles,
		routes::group_roles::create_group_role,
		routes::group_roles::get_group_role,
		routes::group_roles::update_group_role,
		routes::group_roles::deactivate_group_role,
		routes::users::list_users,
		routes::users::get_user_group_roles,
		routes::users::set_user_group_roles,
		routes::users::get_effective_permissions,
		routes::activity::list_activity
	),
	components(
		schemas(
			errors::ErrorResponse,
			routes::health::HealthResponse,
			models::user::User,
			models::auth::SendOtpRequest,
			models::auth::SendOtpResponse,
			models::auth::VerifyOtpRequest,
			models::auth::LoginResponse,
			models::auth::RefreshRequest,
			models::auth::RefreshResponse,
			models::auth::MeResponse,
			models::auth::MessageResponse,
			models::group_role::GroupRole,
			models::group_role::GroupRoleCreateRequest,
			models::group_role::GroupRoleUpdateRequest,
			models::group_role::PermissionInfo,
			models::group_role::UserGroupRolesRequest,
			models::group_role::UserGroupRoles,
			models::group_role::EffectivePermissions,
			models::activity::ActivityEntry,
			models::authz::GuardOutcome,
			models::authz::RouteAccessResponse,
			models::authz::CatalogPermission,
			models::authz::CatalogResponse,
			authz::MatchMode,
			authz::RedirectReason,
			authz::RouteRuleView
		)
	),
	tags(
		(name = "Auth", description = "OTP login and token lifecycle"),
		(name = "Authz", description = "Permission catalog and screen access checks"),
		(name = "Admin", description = "Group roles, user assignments and the audit trail"),
		(name = "Health", description = "Liveness and database status")
	)
)]
pub struct ApiDoc;

/// Port the server listens on, from `APP_PORT` (default 8000).
pub fn server_port() -> u16 {
	std::env::var("APP_PORT")
		.ok()
		.and_then(|value| value.parse::<u16>().ok())
		.unwrap_or(8000)
}

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	normalize_path_operations(&mut doc);
	ensure_security_components(&mut doc);
	ensure_global_security(&mut doc);
	ensure_openapi_version(&mut doc);
	add_examples(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn root_object(doc: &mut Value) -> Option<&mut Map<String, Value>> {
	doc.as_object_mut()
}

fn normalize_path_operations(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		let snapshot = paths.clone();
		for (path, item) in snapshot {
			if let Some(ops) = item.as_object() {
				let mut normalized = Map::new();
				for (method, val) in ops {
					let key = method.to_lowercase();
					if let Some(existing) = normalized.get_mut(&key) {
						merge_values(existing, val);
					} else {
						normalized.insert(key, val.clone());
					}
				}
				paths.insert(path, Value::Object(normalized));
			}
		}
	}
}

fn ensure_security_components(doc: &mut Value) {
	let Some(root) = root_object(doc) else { return; };
	let components = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()));
	let Some(components) = components.as_object_mut() else { return; };

	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()));
	let Some(schemes) = schemes.as_object_mut() else { return; };

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);
}

fn ensure_global_security(doc: &mut Value) {
	if let Some(root) = root_object(doc) {
		root.entry("security")
			.or_insert_with(|| json!([{ "bearerAuth": [] }]));
	}
}

fn ensure_openapi_version(doc: &mut Value) {
	if let Some(root) = root_object(doc) {
		root.entry("openapi")
			.or_insert_with(|| Value::String("3.1.0".to_string()));
	}
}

fn add_examples(doc: &mut Value) {
	if let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) {
		for item in paths.values_mut() {
			if let Some(operations) = item.as_object_mut() {
				for operation in operations.values_mut() {
					apply_parameter_examples(operation);
					apply_request_examples(operation);
					apply_response_examples(operation);
				}
			}
		}
	}
}

fn apply_parameter_examples(operation: &mut Value) {
	let Some(parameters) = operation.get_mut("parameters").and_then(Value::as_array_mut) else { return; };

	for parameter in parameters.iter_mut() {
		let example = match parameter.get("name").and_then(Value::as_str) {
			Some("id") => json!("00000000-0000-0000-0000-000000000000"),
			Some("path") => json!("/admin/bookings"),
			_ => continue,
		};
		if let Some(obj) = parameter.as_object_mut() {
			obj.entry("example").or_insert(example);
		}
	}
}

fn apply_request_examples(operation: &mut Value) {
	let Some(request_body) = operation.get_mut("requestBody") else { return; };
	let Some(content) = request_body.get_mut("content").and_then(Value::as_object_mut) else { return; };
	let Some(app_json) = content.get_mut("application/json").and_then(Value::as_object_mut) else { return; };
	let Some(schema) = app_json.get("schema").and_then(Value::as_object) else { return; };
	let Some(reference) = schema.get("$ref").and_then(Value::as_str) else { return; };

	let example = match reference {
		"#/components/schemas/SendOtpRequest" => Some(json!({
			"mobileNumber": "+919876543210"
		})),
		"#/components/schemas/VerifyOtpRequest" => Some(json!({
			"mobileNumber": "+919876543210",
			"otp": "123456",
			"name": "Asha Rao"
		})),
		"#/components/schemas/GroupRoleCreateRequest" => Some(json!({
			"name": "Front Desk",
			"permissions": ["booking:view", "booking:update", "property:view"]
		})),
		"#/components/schemas/GroupRoleUpdateRequest" => Some(json!({
			"permissions": ["booking:view", "booking:update", "property:view", "review:view"]
		})),
		"#/components/schemas/UserGroupRolesRequest" => Some(json!({
			"group_role_ids": ["00000000-0000-0000-0000-000000000000"]
		})),
		_ => None,
	};

	if let Some(example) = example {
		app_json.insert("example".to_string(), example);
	}
}

fn apply_response_examples(operation: &mut Value) {
	let Some(responses) = operation.get_mut("responses").and_then(Value::as_object_mut) else { return; };

	for response in responses.values_mut() {
		let Some(content) = response.get_mut("content").and_then(Value::as_object_mut) else { continue; };
		let Some(app_json) = content.get_mut("application/json").and_then(Value::as_object_mut) else { continue; };
		let Some(reference) = app_json
			.get("schema")
			.and_then(|schema| schema.get("$ref"))
			.and_then(Value::as_str)
		else {
			continue;
		};

		let example = match reference {
			"#/components/schemas/LoginResponse" => Some(json!({
				"access_token": "eyJhbGciOiJIUzI1Ni...",
				"refresh_token": "eyJhbGciOiJIUzI1Ni...",
				"user_role": "admin",
				"id": "00000000-0000-0000-0000-000000000000",
				"name": "Asha Rao",
				"permissions": ["admin:dashboard:view", "booking:view"]
			})),
			"#/components/schemas/GroupRole" => Some(json!({
				"id": "11111111-1111-1111-1111-111111111111",
				"name": "Front Desk",
				"is_active": true,
				"permissions": ["booking:update", "booking:view", "property:view"],
				"created_at": "2026-01-01T10:00:00Z",
				"updated_at": "2026-01-01T10:00:00Z"
			})),
			"#/components/schemas/RouteAccessResponse" => Some(json!({
				"path": "/admin/bookings",
				"allowed": false,
				"decision": "redirect",
				"location": "/access-denied",
				"reason": "forbidden"
			})),
			_ => None,
		};

		if let Some(example) = example {
			app_json.insert("example".to_string(), example);
		}
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	// Swagger Try-it-out must call the backend over TLS when the server terminates it.
	let tls_enabled = std::env::var("CERT_PATH").is_ok() && std::env::var("KEY_PATH").is_ok();
	let scheme = if tls_enabled { "https" } else { "http" };
	let server_url = format!("{}://localhost:{}", scheme, port);

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}

fn merge_values(target: &mut Value, addition: &Value) {
	match (target, addition) {
		(Value::Object(dest), Value::Object(src)) => {
			for (key, value) in src {
				if let Some(existing) = dest.get_mut(key) {
					merge_values(existing, value);
				} else {
					dest.insert(key.clone(), value.clone());
				}
			}
		}
		(Value::Array(dest), Value::Array(src)) => {
			for item in src {
				if !dest.contains(item) {
					dest.push(item.clone());
				}
			}
		}
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_openapi_lists_admin_paths_with_bearer_security() {
		let doc = build_openapi(8000).unwrap();
		let value = serde_json::to_value(&doc).unwrap();

		assert!(value["paths"]["/api/admin/group-roles"]["post"].is_object());
		assert!(value["paths"]["/api/authz/route-access"]["get"].is_object());
		assert_eq!(value["components"]["securitySchemes"]["bearerAuth"]["scheme"], "bearer");
	}
}
