#![forbid(unsafe_code)]

use crate::McpServer;
use crate::handlers::{artifacts, dependencies, tasks};
use serde_json::Value;

macro_rules! define_tool_dispatch {
    ($($tool_name:literal => $handler:path),* $(,)?) => {
        pub(crate) fn dispatch_tool(
            server: &mut McpServer,
            name: &str,
            args: Value,
        ) -> Option<Value> {
            let resp = match name {
                $($tool_name => $handler(server, args),)*
                _ => return None,
            };
            Some(resp)
        }

        #[cfg(test)]
        pub(crate) fn dispatch_tool_names() -> &'static [&'static str] {
            &[$($tool_name),*]
        }
    };
}

define_tool_dispatch! {
    "createTask" => tasks::tool_create_task,
    "getTask" => tasks::tool_get_task,
    "updateTask" => tasks::tool_update_task,
    "listTasks" => tasks::tool_list_tasks,
    "deleteTask" => tasks::tool_delete_task,
    "moveTask" => tasks::tool_move_task,
    "importTasks" => tasks::tool_import_tasks,
    "getTaskHistory" => tasks::tool_get_task_history,
    "createArtifact" => artifacts::tool_create_artifact,
    "getArtifact" => artifacts::tool_get_artifact,
    "updateArtifact" => artifacts::tool_update_artifact,
    "deleteArtifact" => artifacts::tool_delete_artifact,
    "listArtifacts" => artifacts::tool_list_artifacts,
    "createDependency" => dependencies::tool_create_dependency,
    "updateDependency" => dependencies::tool_update_dependency,
    "deleteDependency" => dependencies::tool_delete_dependency,
    "listDependencies" => dependencies::tool_list_dependencies,
}

#[cfg(test)]
mod tests {
    use super::dispatch_tool_names;
    use crate::tools::tool_definitions;

    #[test]
    fn catalog_and_dispatch_table_agree() {
        let mut advertised: Vec<String> = tool_definitions()
            .iter()
            .filter_map(|tool| {
                tool.get("name")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            })
            .collect();
        let mut dispatchable: Vec<String> = dispatch_tool_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        advertised.sort();
        dispatchable.sort();
        assert_eq!(advertised, dispatchable);
    }

    #[test]
    fn every_tool_has_an_input_schema() {
        for tool in tool_definitions() {
            let name = tool.get("name").and_then(|v| v.as_str()).unwrap_or("?");
            assert!(
                tool.get("inputSchema")
                    .and_then(|v| v.get("type"))
                    .and_then(|v| v.as_str())
                    == Some("object"),
                "{name} must declare an object inputSchema"
            );
        }
    }
}
