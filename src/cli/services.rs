//! Services command implementation

use crate::cli::output::{format_services_json, format_services_table, service_views, ProbeView};
use crate::cli::serve::{load_config, load_services_from_config};
use crate::cli::ServicesArgs;
use crate::health::HealthMonitor;
use crate::registry::ServiceRegistry;
use std::collections::HashMap;
use std::sync::Arc;

/// Handle `augur services`: list configured services, optionally probing each.
pub async fn handle_services(args: &ServicesArgs) -> Result<String, Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    config.validate()?;

    let mut views = service_views(&config);

    if args.probe {
        let registry = Arc::new(ServiceRegistry::new());
        load_services_from_config(&config, &registry).await?;

        let monitor = HealthMonitor::new(registry, config.health_check.clone());
        let results: HashMap<String, ProbeView> = monitor
            .check_all()
            .await
            .iter()
            .map(|(id, result)| (id.clone(), ProbeView::from(result)))
            .collect();

        for view in &mut views {
            view.probe = results.get(&view.id).cloned();
        }
    }

    if args.json {
        Ok(format_services_json(&views))
    } else if views.is_empty() {
        Ok(format!(
            "No services configured in {}",
            args.config.display()
        ))
    } else {
        Ok(format_services_table(&views))
    }
}
