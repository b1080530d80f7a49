//! Kubernetes REST client for Deployments and NodePort Services.

use anyhow::Context;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::config::ClusterConfig;
use crate::deploy::workload::{EndpointSpec, WorkloadSpec};
use crate::error::PlatformError;

use super::{ClusterPlatform, PlatformResult};

#[derive(Debug, Clone, Copy)]
enum Resource {
    Deployment,
    Service,
}

impl Resource {
    fn kind(&self) -> &'static str {
        match self {
            Resource::Deployment => "deployment",
            Resource::Service => "service",
        }
    }

    fn collection(&self, namespace: &str) -> String {
        match self {
            Resource::Deployment => {
                format!("/apis/apps/v1/namespaces/{}/deployments", namespace)
            }
            Resource::Service => format!("/api/v1/namespaces/{}/services", namespace),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KubeClient {
    http: reqwest::Client,
    api_url: Url,
    namespace: String,
    token: Option<String>,
}

impl KubeClient {
    pub fn new(config: &ClusterConfig) -> anyhow::Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .with_context(|| format!("Invalid cluster api_url: {}", config.api_url))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("edgefleet/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_url,
            namespace: config.namespace.clone(),
            token: config.resolve_token()?,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url.as_str().trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> PlatformResult<reqwest::Response> {
        let mut request = self.http.request(method, self.url(path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn create(&self, resource: Resource, name: &str, manifest: Value) -> PlatformResult<()> {
        let response = self
            .send(
                Method::POST,
                &resource.collection(&self.namespace),
                Some(&manifest),
            )
            .await?;
        match response.status() {
            status if status.is_success() => {
                debug!(kind = resource.kind(), name, "created");
                Ok(())
            }
            StatusCode::CONFLICT => Err(PlatformError::AlreadyExists {
                kind: resource.kind(),
                name: name.to_string(),
            }),
            _ => Err(rejected(response).await),
        }
    }

    async fn fetch(&self, resource: Resource, name: &str) -> PlatformResult<Value> {
        let path = format!("{}/{}", resource.collection(&self.namespace), name);
        let response = self.send(Method::GET, &path, None).await?;
        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(PlatformError::NotFound {
                kind: resource.kind(),
                name: name.to_string(),
            }),
            _ => Err(rejected(response).await),
        }
    }

    /// Replace the named object, carrying over the fields the API server
    /// requires on a PUT.
    async fn replace(
        &self,
        resource: Resource,
        name: &str,
        mut manifest: Value,
    ) -> PlatformResult<()> {
        let current = self.fetch(resource, name).await?;
        let version = current
            .pointer("/metadata/resourceVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PlatformError::InvalidResponse(format!(
                    "{} '{}' has no resourceVersion",
                    resource.kind(),
                    name
                ))
            })?;
        manifest["metadata"]["resourceVersion"] = json!(version);
        if let Resource::Service = resource
            && let Some(cluster_ip) = current.pointer("/spec/clusterIP")
        {
            manifest["spec"]["clusterIP"] = cluster_ip.clone();
        }

        let path = format!("{}/{}", resource.collection(&self.namespace), name);
        let response = self.send(Method::PUT, &path, Some(&manifest)).await?;
        match response.status() {
            status if status.is_success() => {
                debug!(kind = resource.kind(), name, "replaced");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(PlatformError::NotFound {
                kind: resource.kind(),
                name: name.to_string(),
            }),
            _ => Err(rejected(response).await),
        }
    }
}

async fn rejected(response: reqwest::Response) -> PlatformError {
    let status = response.status().as_u16();
    let message = match response.text().await {
        Ok(body) => serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body),
        Err(err) => err.to_string(),
    };
    PlatformError::Rejected { status, message }
}

pub fn deployment_manifest(spec: &WorkloadSpec, namespace: &str) -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": spec.name,
            "namespace": namespace,
            "labels": spec.labels,
        },
        "spec": {
            "replicas": spec.replicas,
            "selector": { "matchLabels": spec.labels },
            "template": {
                "metadata": { "labels": spec.labels },
                "spec": {
                    "containers": [{
                        "name": spec.container_name,
                        "image": spec.image,
                        "ports": [{ "containerPort": spec.container_port }],
                    }],
                },
            },
        },
    })
}

pub fn service_manifest(spec: &EndpointSpec, namespace: &str) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": spec.name,
            "namespace": namespace,
        },
        "spec": {
            "type": "NodePort",
            "selector": spec.selector,
            "ports": [{
                "protocol": "TCP",
                "port": spec.port,
                "targetPort": spec.target_port,
                "nodePort": spec.node_port,
            }],
        },
    })
}

impl ClusterPlatform for KubeClient {
    async fn create_workload(&self, spec: &WorkloadSpec) -> PlatformResult<()> {
        let manifest = deployment_manifest(spec, &self.namespace);
        self.create(Resource::Deployment, &spec.name, manifest).await
    }

    async fn update_workload(&self, spec: &WorkloadSpec) -> PlatformResult<()> {
        let manifest = deployment_manifest(spec, &self.namespace);
        self.replace(Resource::Deployment, &spec.name, manifest)
            .await
    }

    async fn create_endpoint(&self, spec: &EndpointSpec) -> PlatformResult<()> {
        let manifest = service_manifest(spec, &self.namespace);
        self.create(Resource::Service, &spec.name, manifest).await
    }

    async fn update_endpoint(&self, spec: &EndpointSpec) -> PlatformResult<()> {
        let manifest = service_manifest(spec, &self.namespace);
        self.replace(Resource::Service, &spec.name, manifest).await
    }
}
