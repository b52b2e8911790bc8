use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;

use crate::authz::SeedReport;
use crate::models::{rbac, user};
use crate::routes::{auth, health, rbac as rbac_routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		health::health,
		auth::register,
		auth::verify_email,
		auth::login,
		auth::me,
		auth::update_me,
		auth::my_permissions,
		auth::my_admin_status,
		auth::check_my_permissions,
		rbac_routes::list_permissions,
		rbac_routes::create_permission,
		rbac_routes::get_permission,
		rbac_routes::list_permissions_by_resource,
		rbac_routes::find_permission,
		rbac_routes::update_permission,
		rbac_routes::delete_permission,
		rbac_routes::list_roles,
		rbac_routes::create_role,
		rbac_routes::get_role,
		rbac_routes::update_role,
		rbac_routes::delete_role,
		rbac_routes::list_role_permissions,
		rbac_routes::assign_permission_to_role,
		rbac_routes::remove_permission_from_role,
		rbac_routes::list_groups,
		rbac_routes::create_group,
		rbac_routes::get_group,
		rbac_routes::update_group,
		rbac_routes::delete_group,
		rbac_routes::assign_role_to_group,
		rbac_routes::remove_role_from_group,
		rbac_routes::add_user_to_group,
		rbac_routes::remove_user_from_group,
		rbac_routes::list_users,
		rbac_routes::create_user,
		rbac_routes::get_user,
		rbac_routes::update_user,
		rbac_routes::delete_user,
		rbac_routes::set_user_group,
		rbac_routes::get_user_permissions,
		rbac_routes::get_user_admin_status,
		rbac_routes::run_bootstrap
	),
	components(
		schemas(
			health::HealthResponse,
			user::User,
			user::UserStatus,
			user::AuthResponse,
			user::LoginRequest,
			user::RegisterRequest,
			user::ProfileUpdateRequest,
			user::RegisterResponse,
			user::VerifyEmailRequest,
			user::UserCreateRequest,
			user::UserUpdateRequest,
			user::SetGroupRequest,
			rbac::Action,
			rbac::Permission,
			rbac::PermissionKey,
			rbac::PermissionGrant,
			rbac::PermissionCreateRequest,
			rbac::PermissionUpdateRequest,
			rbac::Role,
			rbac::RoleCreateRequest,
			rbac::RoleUpdateRequest,
			rbac::RoleDetail,
			rbac::Group,
			rbac::GroupCreateRequest,
			rbac::GroupUpdateRequest,
			rbac::GroupDetail,
			rbac::RolePermission,
			rbac::GroupRole,
			rbac::EffectivePermissions,
			rbac::AdminStatus,
			rbac::PermissionCheckRequest,
			rbac::PermissionCheckResponse,
			SeedReport
		)
	),
	tags(
		(name = "Health", description = "Liveness and database probe"),
		(name = "Auth", description = "Registration, verification, login and caller introspection"),
		(name = "RBAC", description = "Permission, role, group and user administration")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;
	let root = doc
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("OpenAPI document is not a JSON object"))?;

	ensure_security_components(root);
	add_examples(root);
	ensure_servers(root, port);

	Ok(serde_json::from_value(doc)?)
}

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes<S>(doc: &utoipa::openapi::OpenApi) -> anyhow::Result<Router<S>>
where
	S: Clone + Send + Sync + 'static,
{
	let doc_json = Arc::new(serde_json::to_value(doc)?);
	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});
	Ok(Router::new().route("/api-docs/openapi.json", json_route))
}

fn ensure_security_components(root: &mut Map<String, Value>) {
	let components = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()));
	let Some(components) = components.as_object_mut() else { return; };

	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()));
	if let Some(schemes) = schemes.as_object_mut() {
		schemes.insert(
			"bearerAuth".to_string(),
			json!({
				"type": "http",
				"scheme": "bearer",
				"bearerFormat": "JWT"
			}),
		);
	}
}

fn add_examples(root: &mut Map<String, Value>) {
	let Some(paths) = root.get_mut("paths").and_then(Value::as_object_mut) else { return; };

	for item in paths.values_mut() {
		let Some(operations) = item.as_object_mut() else { continue; };
		for operation in operations.values_mut() {
			apply_parameter_examples(operation);
			apply_request_examples(operation);
		}
	}
}

fn apply_parameter_examples(operation: &mut Value) {
	let Some(parameters) = operation.get_mut("parameters").and_then(Value::as_array_mut) else { return; };

	for parameter in parameters.iter_mut() {
		let is_id = parameter
			.get("name")
			.and_then(Value::as_str)
			.is_some_and(|name| name == "id" || name.ends_with("_id"));
		if let (true, Some(obj)) = (is_id, parameter.as_object_mut()) {
			obj.entry("example")
				.or_insert_with(|| json!("00000000-0000-0000-0000-000000000000"));
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
		"#/components/schemas/LoginRequest" => json!({
			"email": "ada@example.com",
			"password": "S3cure!Passw0rd"
		}),
		"#/components/schemas/RegisterRequest" => json!({
			"name": "Ada Lovelace",
			"email": "ada@example.com",
			"password": "S3cure!Passw0rd"
		}),
		"#/components/schemas/PermissionCreateRequest" => json!({
			"name": "product_read",
			"resource": "products",
			"action": "read",
			"description": "View the product catalog"
		}),
		"#/components/schemas/RoleCreateRequest" => json!({
			"name": "catalog_editor",
			"description": "Maintains products"
		}),
		"#/components/schemas/GroupCreateRequest" => json!({
			"name": "merchandising",
			"description": "Merchandising team",
			"is_admin": false
		}),
		"#/components/schemas/PermissionCheckRequest" => json!({
			"permissions": [
				{ "resource": "users", "action": "read" },
				{ "resource": "groups", "action": "read" }
			],
			"require_all": true
		}),
		_ => return,
	};

	app_json.insert("example".to_string(), example);
}

fn ensure_servers(root: &mut Map<String, Value>, port: u16) {
	let server_url = format!("http://localhost:{port}");

	match root.get_mut("servers") {
		Some(Value::Array(servers)) => {
			let present = servers
				.iter()
				.any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !present {
				servers.push(json!({ "url": server_url }));
			}
		}
		_ => {
			root.insert("servers".to_string(), json!([{ "url": server_url }]));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn document_carries_bearer_scheme_and_rbac_paths() {
		let doc = build_openapi(8000).expect("build");
		let value = serde_json::to_value(&doc).expect("json");

		assert_eq!(
			value["components"]["securitySchemes"]["bearerAuth"]["scheme"],
			json!("bearer")
		);
		assert!(value["paths"]["/rbac/roles/{id}/permissions/{permission_id}"]["post"].is_object());
		assert!(value["paths"]["/auth/me/check-permission"]["post"].is_object());
		assert_eq!(value["servers"][0]["url"], json!("http://localhost:8000"));
	}
}
