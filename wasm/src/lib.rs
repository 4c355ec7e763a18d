use ddm::{ddm as lib_ddm, DdmConfig, Tree};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Exposed to JavaScript via wasm-bindgen, this function takes a JSON configuration as a `JsValue`,
/// deserializes it into a `DdmConfig`, compares the two trees, and returns the labeled difference
/// matrix as a `JsValue`. Returns a `JsValue` error if deserialization or comparison fails.
#[wasm_bindgen]
pub fn ddm(config_json: JsValue) -> Result<JsValue, JsValue> {
    let config: DdmConfig = from_value(config_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid DdmConfig JSON: {}", e)))?;
    let diff = lib_ddm(config).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_value(&diff).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Parses a Newick string so the page can draw the tree next to the matrix.
#[wasm_bindgen]
pub fn parse_newick(name: &str, newick: &str) -> Result<JsValue, JsValue> {
    let tree = Tree::from_newick(name, newick).map_err(|e| JsValue::from_str(&e.to_string()))?;
    to_value(&tree).map_err(|e| JsValue::from_str(&e.to_string()))
}
