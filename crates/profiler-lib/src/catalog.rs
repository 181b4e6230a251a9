//! Static catalog of the profiled MCP tools
//!
//! 49 tools across nine servers. Every report lists the tools in this
//! table, so a tool that was never measured still shows up (roofline) or
//! is reported as skipped (time-ratio).

use crate::models::DataLocality;

/// A tool exposed by one of the MCP servers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub server: &'static str,
    pub description: &'static str,
}

const fn tool(server: &'static str, name: &'static str, description: &'static str) -> ToolDefinition {
    ToolDefinition {
        name,
        server,
        description,
    }
}

/// Server names in catalog order
pub const SERVERS: [&str; 9] = [
    "filesystem",
    "git",
    "fetch",
    "sequentialthinking",
    "time",
    "summarize",
    "log_parser",
    "data_aggregate",
    "image_resize",
];

static TOOLS: [ToolDefinition; 49] = [
    // filesystem
    tool("filesystem", "read_file", "Read the complete contents of a file as text. DEPRECATED: Use read_text_file instead."),
    tool("filesystem", "read_text_file", "Read the complete contents of a file from the file system as text."),
    tool("filesystem", "read_media_file", "Read an image or audio file. Returns the base64 encoded data and MIME type."),
    tool("filesystem", "read_multiple_files", "Read the contents of multiple files simultaneously."),
    tool("filesystem", "write_file", "Create a new file or completely overwrite an existing file with new content."),
    tool("filesystem", "edit_file", "Make line-based edits to a text file."),
    tool("filesystem", "create_directory", "Create a new directory or ensure a directory exists."),
    tool("filesystem", "list_directory", "Get a detailed listing of all files and directories in a specified path."),
    tool("filesystem", "list_directory_with_sizes", "Get a detailed listing of all files and directories with sizes."),
    tool("filesystem", "directory_tree", "Get a recursive tree view of files and directories as a JSON structure."),
    tool("filesystem", "move_file", "Move or rename files and directories."),
    tool("filesystem", "search_files", "Recursively search for files and directories matching a pattern."),
    tool("filesystem", "get_file_info", "Retrieve detailed metadata about a file or directory."),
    tool("filesystem", "list_allowed_directories", "Returns the list of directories that this server is allowed to access."),
    // git
    tool("git", "git_status", "Shows the working tree status"),
    tool("git", "git_diff_unstaged", "Shows changes in the working directory that are not yet staged"),
    tool("git", "git_diff_staged", "Shows changes that are staged for commit"),
    tool("git", "git_diff", "Shows differences between branches or commits"),
    tool("git", "git_commit", "Records changes to the repository"),
    tool("git", "git_add", "Adds file contents to the staging area"),
    tool("git", "git_reset", "Unstages all staged changes"),
    tool("git", "git_log", "Shows the commit logs"),
    tool("git", "git_create_branch", "Creates a new branch from an optional base branch"),
    tool("git", "git_checkout", "Switches branches"),
    tool("git", "git_show", "Shows the contents of a commit"),
    tool("git", "git_branch", "List Git branches"),
    // fetch
    tool("fetch", "fetch", "Fetches a URL from the internet and optionally extracts its contents as markdown."),
    // sequentialthinking
    tool("sequentialthinking", "sequentialthinking", "A detailed tool for dynamic and reflective problem-solving through thoughts."),
    // time
    tool("time", "get_current_time", "Get current time in a specific timezones"),
    tool("time", "convert_time", "Convert time between timezones"),
    // summarize
    tool("summarize", "summarize_text", "Summarize the given text."),
    tool("summarize", "summarize_documents", "Summarize multiple documents."),
    tool("summarize", "get_provider_info", "Get information about the current summarization provider."),
    // log_parser
    tool("log_parser", "parse_logs", "Parse raw log content into structured entries."),
    tool("log_parser", "filter_entries", "Filter log entries by severity level."),
    tool("log_parser", "compute_log_statistics", "Compute statistics from parsed log entries."),
    tool("log_parser", "search_entries", "Search log entries by regex pattern."),
    tool("log_parser", "extract_time_range", "Extract time range information from log entries."),
    // data_aggregate
    tool("data_aggregate", "aggregate_list", "Aggregate a list of dictionaries by grouping, counting, or summing."),
    tool("data_aggregate", "merge_summaries", "Merge multiple summary dictionaries into one."),
    tool("data_aggregate", "combine_research_results", "Combine multiple research/search results into a coherent summary."),
    tool("data_aggregate", "deduplicate", "Remove duplicate items based on key fields."),
    tool("data_aggregate", "compute_trends", "Compute trends from time-series data."),
    // image_resize
    tool("image_resize", "get_image_info", "Get detailed information about an image."),
    tool("image_resize", "resize_image", "Resize an image and return as base64."),
    tool("image_resize", "scan_directory", "Scan a directory for image files."),
    tool("image_resize", "compute_image_hash", "Compute perceptual hash of an image for duplicate detection."),
    tool("image_resize", "compare_hashes", "Compare image hashes to find duplicates/similar images."),
    tool("image_resize", "batch_resize", "Resize multiple images at once (e.g., create thumbnails)."),
];

/// Every tool in catalog order
pub fn all_tools() -> &'static [ToolDefinition] {
    &TOOLS
}

pub fn tool_count() -> usize {
    TOOLS.len()
}

pub fn tools_for_server(server: &str) -> impl Iterator<Item = &'static ToolDefinition> + '_ {
    TOOLS.iter().filter(move |t| t.server == server)
}

pub fn find_tool(name: &str) -> Option<&'static ToolDefinition> {
    TOOLS.iter().find(|t| t.name == name)
}

/// Data locality class of a server's tools
pub fn data_locality(server: &str) -> DataLocality {
    match server {
        "filesystem" | "image_resize" | "log_parser" => DataLocality::LocalData,
        "data_aggregate" | "sequentialthinking" => DataLocality::LocalCompute,
        "git" => DataLocality::VersionControl,
        "fetch" | "summarize" => DataLocality::Network,
        "time" => DataLocality::LocalUtility,
        _ => DataLocality::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_size() {
        assert_eq!(tool_count(), 49);
        let counts: Vec<usize> = SERVERS.iter().map(|s| tools_for_server(s).count()).collect();
        assert_eq!(counts, vec![14, 12, 1, 1, 2, 3, 5, 5, 6]);
    }

    #[test]
    fn test_tool_names_unique() {
        let names: HashSet<_> = all_tools().iter().map(|t| t.name).collect();
        assert_eq!(names.len(), tool_count());
    }

    #[test]
    fn test_every_server_has_known_locality() {
        for server in SERVERS {
            assert_ne!(data_locality(server), DataLocality::Unknown, "{}", server);
        }
        assert_eq!(data_locality("weather"), DataLocality::Unknown);
    }

    #[test]
    fn test_find_tool() {
        let t = find_tool("git_log").unwrap();
        assert_eq!(t.server, "git");
        assert!(find_tool("nope").is_none());
    }
}
