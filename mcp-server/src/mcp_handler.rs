use anyhow::Result;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::Arc;
use tracing::{info, warn};

use crate::use_cases::{BookUseCase, DrawUseCase, ReportUseCase};

#[derive(Debug, serde::Deserialize)]
struct JsonRpcRequest {
    #[serde(default = "default_jsonrpc")]
    jsonrpc: String,
    method: String,
    params: Option<Value>,
    id: Option<Value>,
}

fn default_jsonrpc() -> String {
    "2.0".to_string()
}

#[derive(Debug, serde::Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Option<Value>,
}

#[derive(Debug, serde::Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl JsonRpcResponse {
    fn new(id: Option<Value>, result: Option<Value>, error: Option<JsonRpcError>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result,
            error,
            id,
        }
    }

    // requests without an id are answered as id 1
    fn success(id: Option<Value>, result: Value) -> Self {
        Self::new(Some(id.unwrap_or(json!(1))), Some(result), None)
    }

    fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        let error = JsonRpcError {
            code,
            message: message.into(),
            data: None,
        };
        Self::new(Some(id.unwrap_or(json!(1))), None, Some(error))
    }

    fn parse_error(e: &serde_json::Error) -> Self {
        let error = JsonRpcError {
            code: -32700,
            message: "Parse error".to_string(),
            data: Some(json!(e.to_string())),
        };
        Self::new(None, None, Some(error))
    }
}

#[derive(Debug, serde::Serialize)]
struct Tool {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

pub struct MCPHandler {
    book_use_case: Arc<BookUseCase>,
    draw_use_case: Arc<DrawUseCase>,
    report_use_case: Arc<ReportUseCase>,
}

impl MCPHandler {
    pub fn new(
        book_use_case: Arc<BookUseCase>,
        draw_use_case: Arc<DrawUseCase>,
        report_use_case: Arc<ReportUseCase>,
    ) -> Self {
        Self {
            book_use_case,
            draw_use_case,
            report_use_case,
        }
    }

    pub async fn serve<R, W>(self, reader: R, mut writer: W) -> Result<()>
    where
        R: BufRead,
        W: Write,
    {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str::<JsonRpcRequest>(&line) {
                Ok(req) => req,
                Err(e) => {
                    warn!("Failed to parse request: {} - Line: {}", e, line);
                    let error_response = JsonRpcResponse::parse_error(&e);
                    let response_json = serde_json::to_string(&error_response)?;
                    writeln!(writer, "{}", response_json)?;
                    writer.flush()?;
                    continue;
                }
            };

            // notifications never get a response
            let is_notification =
                request.id.is_none() || request.method.starts_with("notifications/");
            if is_notification {
                if request.method == "notifications/initialized" {
                    info!("🎰 Client initialized");
                }
                continue;
            }

            let response = self.handle_request(request).await;
            let response_json = serde_json::to_string(&response)?;
            writeln!(writer, "{}", response_json)?;
            writer.flush()?;
        }

        Ok(())
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id).await,
            "tools/list" => self.handle_list_tools(request.id).await,
            "tools/call" => self.handle_call_tool(request.params, request.id).await,
            _ => JsonRpcResponse::failure(
                request.id,
                -32601,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    async fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("🎰 Initializing lotto pool MCP server");
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "lotto-pool-mcp-server",
                    "version": "0.1.0"
                }
            }),
        )
    }

    async fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools = self.get_tools();
        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_call_tool(&self, params: Option<Value>, id: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::failure(id, -32602, "Missing params");
        };
        let Some(tool_name) = params.get("name").and_then(|n| n.as_str()) else {
            return JsonRpcResponse::failure(id, -32602, "Missing tool name");
        };

        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
        let arguments_map: HashMap<String, Value> =
            serde_json::from_value(arguments).unwrap_or_default();

        match self.execute_tool(tool_name, &arguments_map).await {
            Ok(content) => JsonRpcResponse::success(
                id,
                json!({
                    "content": [
                        {
                            "type": "text",
                            "text": content
                        }
                    ]
                }),
            ),
            Err(e) => {
                JsonRpcResponse::failure(id, -32603, format!("Tool execution error: {}", e))
            }
        }
    }

    async fn execute_tool(
        &self,
        tool_name: &str,
        arguments: &HashMap<String, Value>,
    ) -> Result<String> {
        match tool_name {
            "add_buyer" => self.book_use_case.add_buyer(arguments).await,
            "list_buyers" => self.book_use_case.list_buyers(arguments).await,
            "delete_buyer" => self.book_use_case.delete_buyer(arguments).await,
            "list_blacklist" => self.book_use_case.list_blacklist(arguments).await,
            "add_blacklist" => self.book_use_case.add_blacklist(arguments).await,
            "update_blacklist" => self.book_use_case.update_blacklist(arguments).await,
            "delete_blacklist" => self.book_use_case.delete_blacklist(arguments).await,
            "get_cut_config" => self.book_use_case.get_cut_config(arguments).await,
            "save_cut_config" => self.book_use_case.save_cut_config(arguments).await,
            "classify_number" => self.book_use_case.classify_number(arguments).await,
            "record_entries" => self.book_use_case.record_entries(arguments).await,
            "list_entries" => self.book_use_case.list_entries(arguments).await,
            "delete_entry_pair" => self.book_use_case.delete_entry_pair(arguments).await,
            "reset_entries" => self.book_use_case.reset_entries(arguments).await,
            "fetch_draw_result" => self.draw_use_case.fetch_draw_result(arguments).await,
            "backfill_draw_results" => self.draw_use_case.backfill_draw_results(arguments).await,
            "check_winners" => self.draw_use_case.check_winners(arguments).await,
            "summary" => self.report_use_case.summary(arguments).await,
            "dealer_sheet" => self.report_use_case.dealer_sheet(arguments).await,
            _ => Err(anyhow::anyhow!("Unknown tool: {}", tool_name)),
        }
    }

    fn get_tools(&self) -> Vec<Tool> {
        let no_params = || json!({ "type": "object", "properties": {} });
        let id_param = |what: &str| {
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "integer", "description": format!("{} id", what) }
                },
                "required": ["id"]
            })
        };
        let number_param = json!({
            "type": "object",
            "properties": {
                "number": { "type": "string", "description": "2 or 3 digit number" }
            },
            "required": ["number"]
        });
        let date_param = json!({
            "type": "object",
            "properties": {
                "date": {
                    "type": "string",
                    "description": "Draw date in YYYY-MM-DD format (default: latest draw)"
                }
            }
        });
        let digits_param = json!({
            "type": "object",
            "properties": {
                "digits": {
                    "type": "integer",
                    "enum": [2, 3],
                    "description": "Only 2 or 3 digit numbers"
                },
                "by_buyer": { "type": "boolean", "description": "Group totals per buyer" }
            }
        });
        let amount = |description: &str| json!({ "type": "string", "description": description });

        vec![
            Tool {
                name: "add_buyer".to_string(),
                description: "Add a buyer to the book".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Buyer name" },
                        "phone": { "type": "string", "description": "Optional phone number" }
                    },
                    "required": ["name"]
                }),
            },
            Tool {
                name: "list_buyers".to_string(),
                description: "List all buyers".to_string(),
                input_schema: no_params(),
            },
            Tool {
                name: "delete_buyer".to_string(),
                description: "Delete a buyer that has no entries left".to_string(),
                input_schema: id_param("Buyer"),
            },
            Tool {
                name: "list_blacklist".to_string(),
                description: "List numbers the pool refuses to take".to_string(),
                input_schema: no_params(),
            },
            Tool {
                name: "add_blacklist".to_string(),
                description: "Refuse a number from now on".to_string(),
                input_schema: number_param.clone(),
            },
            Tool {
                name: "update_blacklist".to_string(),
                description: "Change a refused number".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "id": { "type": "integer", "description": "Blacklist entry id" },
                        "number": { "type": "string", "description": "2 or 3 digit number" }
                    },
                    "required": ["id", "number"]
                }),
            },
            Tool {
                name: "delete_blacklist".to_string(),
                description: "Accept a refused number again".to_string(),
                input_schema: id_param("Blacklist entry"),
            },
            Tool {
                name: "get_cut_config".to_string(),
                description: "Get the current keep ceilings per pattern".to_string(),
                input_schema: no_params(),
            },
            Tool {
                name: "save_cut_config".to_string(),
                description: "Save keep ceilings per pattern; blank means keep nothing".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "threeDigitTop": amount("3 ตัวบน ceiling"),
                        "threeDigitTod": amount("โต๊ด ceiling"),
                        "threeDigitBottom": amount("3 ตัวล่าง ceiling"),
                        "twoDigitTop": amount("2 ตัวบน ceiling"),
                        "twoDigitBottom": amount("2 ตัวล่าง ceiling")
                    }
                }),
            },
            Tool {
                name: "classify_number".to_string(),
                description: "Tell whether a number is 2 or 3 digits, its patterns, \
                              and whether it is refused"
                    .to_string(),
                input_schema: number_param,
            },
            Tool {
                name: "record_entries".to_string(),
                description: "Record a batch of entries; all or nothing".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "entries": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "buyerId": { "type": "integer" },
                                    "number": { "type": "string" },
                                    "top": amount("Top amount"),
                                    "tod": amount("Tod amount, 3 digit only"),
                                    "bottom2": amount("Bottom amount, 2 digit only"),
                                    "bottom3": amount("Bottom amount, 3 digit only")
                                },
                                "required": ["buyerId", "number"]
                            }
                        }
                    },
                    "required": ["entries"]
                }),
            },
            Tool {
                name: "list_entries".to_string(),
                description: "List entries, optionally per buyer or as the self/dealer view"
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "buyer_id": { "type": "integer", "description": "Only this buyer" },
                        "source": {
                            "type": "string",
                            "enum": ["self", "dealer"],
                            "description": "Kept or sent side"
                        }
                    }
                }),
            },
            Tool {
                name: "delete_entry_pair".to_string(),
                description: "Delete a buyer's entries on a number from both views".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "buyer_id": { "type": "integer", "description": "Buyer id" },
                        "number": { "type": "string", "description": "2 or 3 digit number" }
                    },
                    "required": ["buyer_id", "number"]
                }),
            },
            Tool {
                name: "reset_entries".to_string(),
                description: "Delete every entry".to_string(),
                input_schema: no_params(),
            },
            Tool {
                name: "fetch_draw_result".to_string(),
                description: "Fetch and cache the official GLO result for a draw".to_string(),
                input_schema: date_param.clone(),
            },
            Tool {
                name: "backfill_draw_results".to_string(),
                description: "Fetch every past draw of a year that is not cached yet".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "year": { "type": "integer", "description": "Year in YYYY format" }
                    },
                    "required": ["year"]
                }),
            },
            Tool {
                name: "check_winners".to_string(),
                description: "Match all entries against a draw and compute payouts".to_string(),
                input_schema: date_param,
            },
            Tool {
                name: "summary".to_string(),
                description: "Totals per pattern with kept and sent shares".to_string(),
                input_schema: digits_param.clone(),
            },
            Tool {
                name: "dealer_sheet".to_string(),
                description: "Amounts sent to the dealer per number".to_string(),
                input_schema: digits_param,
            },
        ]
    }
}

pub fn stdio() -> (BufReader<io::Stdin>, io::Stdout) {
    (BufReader::new(io::stdin()), io::stdout())
}
