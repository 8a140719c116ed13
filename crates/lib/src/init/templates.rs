//! Template content for `ottopie init`.

pub use crate::plugin::FOLDER_SYNC_SOURCE as FOLDER_SYNC_TEMPLATE;

/// LuaLS type definitions for the host API
pub const OTTOPIE_D_LUA: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/plugins/types/ottopie.d.lua"));

/// Template for .luarc.json (LuaLS configuration)
pub const LUARC_JSON_TEMPLATE: &str = r#"{
  "$schema": "https://raw.githubusercontent.com/LuaLS/vscode-lua/master/setting/schema.json",
  "runtime": {
    "version": "Lua 5.4"
  },
  "workspace": {
    "library": [
      "types"
    ],
    "checkThirdParty": false
  },
  "diagnostics": {
    "globals": ["ottopie", "run"]
  }
}
"#;
