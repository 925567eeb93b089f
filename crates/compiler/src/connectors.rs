//! Connector dependency analysis.
//!
//! Walks every resource of a compiled project and records which connectors it
//! needs, whether each connector is usable without credentials, and which
//! resources depend on it.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use sluice_common::{AnalyzeSettings, RequestContext};
use sluice_drivers::slack::decode_slack_props;
use sluice_drivers::{Driver, DriverError, DriverRegistry, DriverSpec, Properties};
use tracing::{debug, warn};

use crate::error::AnalyzeError;
use crate::project::{Notifier, Project, Resource, ResourceName, ResourceSpec, ResolverSpec};

/// A connector used somewhere in a project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connector {
    pub name: String,
    pub driver: String,
    pub spec: DriverSpec,
    pub default_config: BTreeMap<String, String>,
    /// Distinct referencing resources, in first-reference order.
    pub resources: Vec<ResourceName>,
    /// Cleared as soon as any reference cannot be proven credential-free;
    /// never set again afterwards.
    pub anonymous_access: bool,
}

/// Extracts connector metadata from `project`.
///
/// The result has one entry per distinct connector name, sorted by name. Either
/// the whole catalog is returned or a single error; a failed probe only
/// downgrades the affected connector.
pub async fn analyze_connectors(
    ctx: &RequestContext,
    project: &Project,
    registry: &DriverRegistry,
    settings: &AnalyzeSettings,
) -> Result<Vec<Connector>, AnalyzeError> {
    let mut analyzer = ConnectorAnalyzer {
        ctx,
        project,
        registry,
        probe_timeout: settings.probe_timeout(),
        result: HashMap::new(),
    };
    analyzer.analyze().await?;

    let mut res: Vec<Connector> = analyzer.result.into_values().collect();
    res.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(res)
}

struct ConnectorAnalyzer<'a> {
    ctx: &'a RequestContext,
    project: &'a Project,
    registry: &'a DriverRegistry,
    probe_timeout: Duration,
    result: HashMap<String, Connector>,
}

impl ConnectorAnalyzer<'_> {
    async fn analyze(&mut self) -> Result<(), AnalyzeError> {
        let project = self.project;

        for def in &project.connectors {
            self.track_connector(&def.name, None, false)?;
        }
        if let Some(olap) = project.olap_connector.as_deref().filter(|c| !c.is_empty()) {
            self.track_connector(olap, None, false)?;
        }

        for r in &project.resources {
            self.ctx.check()?;
            self.analyze_resource(r).await?;
        }
        Ok(())
    }

    async fn analyze_resource(&mut self, r: &Resource) -> Result<(), AnalyzeError> {
        match &r.spec {
            ResourceSpec::Source(spec) => {
                self.analyze_input(r, &spec.sink_connector, &spec.source_connector, &spec.properties)
                    .await
            }
            ResourceSpec::Model(spec) => {
                self.analyze_input(
                    r,
                    &spec.output_connector,
                    &spec.input_connector,
                    &spec.input_properties,
                )
                .await
            }
            ResourceSpec::MetricsView(spec) => self.track_connector(&spec.connector, Some(r), false),
            ResourceSpec::Migration(spec) => self.track_connector(&spec.connector, Some(r), false),
            ResourceSpec::Api(spec) | ResourceSpec::Component(spec) => self.analyze_resolver(r, spec),
            ResourceSpec::Alert(spec) | ResourceSpec::Report(spec) => {
                self.analyze_notifiers(r, &spec.notifiers)
            }
            ResourceSpec::Other => Ok(()),
        }
    }

    /// Shared by sources and models: the output side is tracked as is, the
    /// input side is probed for anonymous access and for tertiary connectors.
    async fn analyze_input(
        &mut self,
        r: &Resource,
        output: &str,
        input: &str,
        props: &Properties,
    ) -> Result<(), AnalyzeError> {
        self.track_connector(output, Some(r), false)?;

        let (_, driver) = self.driver_for_connector(input, Some(r))?;

        // The verdict cannot improve once cleared, so skip the probe.
        let known_non_anonymous = self.result.get(input).is_some_and(|c| !c.anonymous_access);
        let anon_access = if known_non_anonymous {
            false
        } else {
            let probe_ctx = self.probe_context();
            probe_or_default(
                self.ctx,
                &probe_ctx,
                "anonymous access",
                input,
                false,
                driver.has_anonymous_source_access(&probe_ctx, props),
            )
            .await?
        };
        self.track_connector(input, Some(r), anon_access)?;

        // Anonymous access is not probed for these since their properties are unknown.
        let probe_ctx = self.probe_context();
        let others = probe_or_default(
            self.ctx,
            &probe_ctx,
            "tertiary connector",
            input,
            Vec::new(),
            driver.tertiary_source_connectors(&probe_ctx, props),
        )
        .await?;
        for connector in &others {
            self.track_connector(connector, Some(r), false)?;
        }
        Ok(())
    }

    /// Only the "sql" resolver names a connector, through an optional string
    /// `connector` property. Anything else is ignored.
    fn analyze_resolver(&mut self, r: &Resource, spec: &ResolverSpec) -> Result<(), AnalyzeError> {
        if spec.resolver != "sql" {
            return Ok(());
        }
        match spec.resolver_properties.get("connector").and_then(Value::as_str) {
            Some(connector) if !connector.is_empty() => self.track_connector(connector, Some(r), false),
            _ => Ok(()),
        }
    }

    fn analyze_notifiers(&mut self, r: &Resource, notifiers: &[Notifier]) -> Result<(), AnalyzeError> {
        for n in notifiers {
            let anon_access = n.connector == "slack" && slack_webhooks_only(r, n);
            self.track_connector(&n.connector, Some(r), anon_access)?;
        }
        Ok(())
    }

    fn track_connector(
        &mut self,
        connector: &str,
        r: Option<&Resource>,
        anon_access: bool,
    ) -> Result<(), AnalyzeError> {
        let (project, registry) = (self.project, self.registry);
        let entry = match self.result.entry(connector.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let (driver, implementation) = resolve_driver(project, registry, connector, r)?;
                let default_config =
                    project.connector_def(connector).map(|def| def.defaults.clone()).unwrap_or_default();
                debug!(connector, driver = %driver, "tracking connector");
                entry.insert(Connector {
                    name: connector.to_string(),
                    driver,
                    spec: implementation.spec(),
                    default_config,
                    resources: Vec::new(),
                    anonymous_access: true,
                })
            }
        };

        if let Some(r) = r {
            let name = r.resource_name();
            let normalized = name.normalized();
            if !entry.resources.iter().any(|existing| existing.normalized() == normalized) {
                entry.resources.push(name);
            }
        }

        if !anon_access {
            entry.anonymous_access = false;
        }
        Ok(())
    }

    fn driver_for_connector(
        &self,
        connector: &str,
        r: Option<&Resource>,
    ) -> Result<(String, Arc<dyn Driver>), AnalyzeError> {
        resolve_driver(self.project, self.registry, connector, r)
    }

    fn probe_context(&self) -> RequestContext {
        self.ctx.child().with_timeout(self.probe_timeout)
    }
}

/// The driver is taken from the project's declaration of `connector`,
/// falling back to the connector name itself.
fn resolve_driver(
    project: &Project,
    registry: &DriverRegistry,
    connector: &str,
    r: Option<&Resource>,
) -> Result<(String, Arc<dyn Driver>), AnalyzeError> {
    let driver =
        project.connector_def(connector).and_then(|def| def.driver.clone()).unwrap_or_else(|| connector.to_string());
    let implementation = registry.resolve(connector, &driver).map_err(|source| AnalyzeError::UnresolvedConnector {
        connector: connector.to_string(),
        resource: r.map(|r| r.resource_name().to_string()),
        source,
    })?;
    Ok((driver, implementation))
}

fn slack_webhooks_only(r: &Resource, n: &Notifier) -> bool {
    match decode_slack_props(&n.properties) {
        Ok(props) => props.webhooks_only(),
        Err(err) => {
            warn!(resource = %r.resource_name(), %err, "cannot decode slack notifier, assuming credentials are needed");
            false
        }
    }
}

/// Runs a best-effort driver probe under `probe_ctx`.
///
/// Probe failures, including the probe's own timeout, degrade to `default`.
/// Only cancellation or expiry of the caller's `ctx` is returned as an error.
pub(crate) async fn probe_or_default<T, F>(
    ctx: &RequestContext,
    probe_ctx: &RequestContext,
    what: &str,
    connector: &str,
    default: T,
    probe: F,
) -> Result<T, AnalyzeError>
where
    F: Future<Output = Result<T, DriverError>>,
{
    let outcome = match probe_ctx.run(probe).await {
        Ok(outcome) => outcome,
        Err(err) => Err(DriverError::from(err)),
    };
    match outcome {
        Ok(value) => Ok(value),
        Err(err) => {
            ctx.check()?;
            warn!(connector, %err, "{what} probe failed, using conservative default");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_common::Error;

    #[tokio::test]
    async fn test_probe_or_default_passes_value() {
        let ctx = RequestContext::new();
        let v = probe_or_default(&ctx, &ctx, "test", "c", false, async { Ok(true) }).await.unwrap();
        assert!(v);
    }

    #[tokio::test]
    async fn test_probe_or_default_degrades_on_error() {
        let ctx = RequestContext::new();
        let v = probe_or_default(&ctx, &ctx, "test", "c", vec!["x".to_string()], async {
            Err(DriverError::invalid_properties("s3", "bad path"))
        })
        .await
        .unwrap();
        assert_eq!(v, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn test_probe_or_default_degrades_on_probe_timeout() {
        let ctx = RequestContext::new();
        let probe_ctx = ctx.child().with_timeout(Duration::from_millis(5));
        let v = probe_or_default(&ctx, &probe_ctx, "test", "c", false, async {
            std::future::pending::<Result<bool, DriverError>>().await
        })
        .await
        .unwrap();
        assert!(!v);
    }

    #[tokio::test]
    async fn test_probe_or_default_propagates_caller_cancellation() {
        let ctx = RequestContext::new();
        ctx.cancel();
        let probe_ctx = ctx.child();
        let err = probe_or_default(&ctx, &probe_ctx, "test", "c", false, async { Ok(true) })
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::Aborted(Error::Cancelled)));
        assert!(err.is_cancellation());
    }
}
