//! Users command implementation

use crate::bulk::{BulkActionExecutor, SelectionSet};
use crate::cli::output::{format_bulk_outcome, format_users_json, format_users_table};
use crate::cli::{UsersBulkArgs, UsersListArgs};
use crate::config::FleetSyncConfig;
use crate::gateway::FetchGateway;
use crate::paging::{PagedQueryController, QueryPatch, SortDirection, SortSpec};
use serde_json::Value;
use std::sync::Arc;

fn users_controller(
    gateway: Arc<dyn FetchGateway>,
    config: &FleetSyncConfig,
) -> PagedQueryController<Value> {
    PagedQueryController::new(gateway, &config.paging.users_path, config.paging.page_size)
}

/// Build the query patch described by the list flags
pub fn list_patch(args: &UsersListArgs) -> QueryPatch {
    QueryPatch {
        page: Some(args.page),
        page_size: args.page_size,
        search: args.search.clone().map(Some),
        status_filter: args.status.clone().map(Some),
        sort: args.sort.clone().map(|field| {
            let direction = if args.desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            Some(SortSpec::new(field, direction))
        }),
    }
}

/// Handle users list command
pub async fn handle_users_list(
    args: &UsersListArgs,
    gateway: Arc<dyn FetchGateway>,
    config: &FleetSyncConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let controller = users_controller(gateway, config);
    let mut page = controller.set_query(list_patch(args)).await?;

    // The total is only known after the first response; past the last
    // page, show the last one instead of an empty table
    if page.total_pages > 0 && page.page > page.total_pages {
        page = controller.go_to_page(page.page).await?;
    }

    if args.json {
        Ok(format_users_json(&page))
    } else {
        Ok(format_users_table(&page))
    }
}

/// Handle users bulk command
pub async fn handle_users_bulk(
    args: &UsersBulkArgs,
    gateway: Arc<dyn FetchGateway>,
    config: &FleetSyncConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let controller = Arc::new(users_controller(Arc::clone(&gateway), config));
    let executor = BulkActionExecutor::new(gateway, &config.paging.users_bulk_path, controller);

    let mut selection: SelectionSet = args.ids.iter().cloned().collect();
    let outcome = executor.execute(&args.action, &mut selection).await?;
    Ok(format_bulk_outcome(&outcome))
}
