//! Command handlers. Each returns the JSON document printed to stdout.

use access_control::AccessControlModule;
use access_control::domain::{DenialReason, GuardOutcome, RouteEntry};
use access_control_sdk::PermissionAction;
use anyhow::Context;
use secrecy::SecretString;
use serde_json::{Value, json};

const PASSWORD_ENV: &str = "CONSOLE_ADMIN_PASSWORD";

pub async fn login(
    module: &AccessControlModule,
    identifier: &str,
    password: Option<String>,
) -> anyhow::Result<Value> {
    let password = match password {
        Some(password) => password,
        None => std::env::var(PASSWORD_ENV)
            .with_context(|| format!("no --password given and {PASSWORD_ENV} is unset"))?,
    };
    let outcome = module
        .service()
        .login(identifier, &SecretString::from(password))
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    Ok(json!({
        "user": outcome.user,
        "role_ids": outcome.permissions.role_ids().as_slice(),
        "grants": outcome.permissions.grants().len(),
        "landing_route": outcome.landing_route,
    }))
}

pub fn logout(module: &AccessControlModule) -> anyhow::Result<Value> {
    let redirect = module.service().logout()?;
    Ok(json!({ "redirect": redirect }))
}

pub fn whoami(module: &AccessControlModule) -> Value {
    let session = module.session();
    match session.user() {
        Some(user) if session.is_authenticated() => json!({
            "authenticated": true,
            "name": user.display_name(),
            "role": user.role,
            "role_ids": session.role_ids().as_slice(),
        }),
        _ => json!({ "authenticated": false }),
    }
}

pub async fn check(
    module: &AccessControlModule,
    name: &str,
    sub_module: Option<&str>,
    action: PermissionAction,
) -> Value {
    let snapshot = module.store().ready().await;
    json!({
        "module": name,
        "sub_module": sub_module,
        "action": action.as_str(),
        "allowed": snapshot.check(name, sub_module, action),
    })
}

pub async fn guard(module: &AccessControlModule, path: &str) -> Value {
    let outcome = module.guard().authorize(path).await;
    outcome_json(path, &outcome)
}

pub async fn sidebar(module: &AccessControlModule) -> anyhow::Result<Value> {
    let _settled = module.store().ready().await;
    Ok(serde_json::to_value(module.sidebar().menu())?)
}

pub fn breadcrumbs(module: &AccessControlModule, path: &str) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(module.breadcrumbs().resolve(path))?)
}

pub fn routes(module: &AccessControlModule) -> Value {
    Value::Array(module.routes().entries().iter().map(entry_json).collect())
}

pub async fn landing(module: &AccessControlModule) -> Value {
    let snapshot = module.store().ready().await;
    json!({ "landing_route": module.guard().landing_route(&snapshot) })
}

fn entry_json(entry: &RouteEntry) -> Value {
    let requirement = &entry.requirement;
    json!({
        "key": entry.key,
        "name": entry.name,
        "path": entry.path.as_str(),
        "protected": entry.protected,
        "sidebar": entry.visible_in_sidebar,
        "module": requirement.module,
        "sub_module": requirement.sub_module,
        "action": requirement.action.as_str(),
        "capability": requirement.capability,
    })
}

fn outcome_json(path: &str, outcome: &GuardOutcome) -> Value {
    match outcome {
        GuardOutcome::Unauthenticated { redirect } => json!({
            "path": path,
            "outcome": "unauthenticated",
            "redirect": redirect,
        }),
        GuardOutcome::Checking => json!({ "path": path, "outcome": "checking" }),
        GuardOutcome::Authorized { route_key, params } => json!({
            "path": path,
            "outcome": "authorized",
            "route": route_key,
            "params": params
                .iter()
                .map(|(name, value)| (name.clone(), Value::from(value.as_str())))
                .collect::<serde_json::Map<String, Value>>(),
        }),
        GuardOutcome::Denied { reason, redirect } => {
            let label = match reason {
                DenialReason::AuthorizationDenied => "denied",
                DenialReason::RouteNotFound => "not_found",
            };
            json!({ "path": path, "outcome": label, "redirect": redirect })
        }
    }
}
