//! Device profiles: prompt recognition and mode commands per device family.
//!
//! A profile knows how a device family prints its prompts, how it paginates
//! long output, and which commands enter and leave configuration mode.
//! Prompt patterns tolerate leading NUL bytes and one carriage return, which
//! several vendors emit before redrawing the prompt.

use log::trace;
use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

use crate::error::ConnectorError;

/// Device types with a built-in profile.
pub const SUPPORTED_DEVICE_TYPES: &[&str] = &[
    "cisco_ios",
    "cisco_xe",
    "cisco_nxos",
    "arista_eos",
    "huawei",
    "hp_comware",
    "juniper_junos",
];

struct ProfileSpec {
    device_types: &'static [&'static str],
    prompts: &'static [&'static str],
    config_prompts: &'static [&'static str],
    more: &'static [&'static str],
    config_command: &'static str,
    exit_config_command: &'static str,
    disable_paging: Option<&'static str>,
}

const VRP_MORE: &[&str] = &[r"\s*---- More ----\s*"];

const PROFILES: &[ProfileSpec] = &[
    ProfileSpec {
        device_types: &["cisco_ios", "cisco_xe", "cisco_nxos", "arista_eos"],
        prompts: &[r"\S+\(\S+\)#\s*$", r"[^\s#]+#\s*$", r"[^\s<]+>\s*$"],
        config_prompts: &[r"\S+\(\S+\)#\s*$"],
        more: &[r"\s*--More--\s*", r"\s*<--- More --->\s*"],
        config_command: "configure terminal",
        exit_config_command: "end",
        disable_paging: Some("terminal length 0"),
    },
    ProfileSpec {
        device_types: &["huawei"],
        prompts: &[r"(HRP_M|HRP_S)?\[.+\]\s*$", r"(RBM_P|RBM_S)?<.+>\s*$"],
        config_prompts: &[r"(HRP_M|HRP_S)?\[.+\]\s*$"],
        more: VRP_MORE,
        config_command: "system-view",
        exit_config_command: "return",
        disable_paging: Some("screen-length 0 temporary"),
    },
    ProfileSpec {
        device_types: &["hp_comware"],
        prompts: &[r"(RBM_P|RBM_S)?\[.+\]\s*$", r"(RBM_P|RBM_S)?<.+>\s*$"],
        config_prompts: &[r"(RBM_P|RBM_S)?\[.+\]\s*$"],
        more: VRP_MORE,
        config_command: "system-view",
        exit_config_command: "return",
        disable_paging: Some("screen-length disable"),
    },
    ProfileSpec {
        device_types: &["juniper_junos"],
        prompts: &[r"\S+@\S+#\s*$", r"\S+@\S+>\s*$"],
        config_prompts: &[r"\S+@\S+#\s*$"],
        more: &[r"---\(more.*\)---"],
        config_command: "configure",
        exit_config_command: "exit configuration-mode",
        disable_paging: Some("set cli screen-length 0"),
    },
];

/// Prompt and mode knowledge for one device family.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    device_type: String,
    prompt: RegexSet,
    config_prompt: RegexSet,
    more: RegexSet,
    config_command: &'static str,
    exit_config_command: &'static str,
    disable_paging: Option<&'static str>,
}

impl DeviceProfile {
    /// Looks up the profile for a `device_type` setting.
    pub fn for_device_type(device_type: &str) -> Result<Self, ConnectorError> {
        let spec = PROFILES
            .iter()
            .find(|spec| spec.device_types.contains(&device_type))
            .ok_or_else(|| ConnectorError::UnsupportedDevice(device_type.to_string()))?;

        Ok(Self {
            device_type: device_type.to_string(),
            prompt: prompt_set(spec.prompts)?,
            config_prompt: prompt_set(spec.config_prompts)?,
            more: RegexSet::new(spec.more).map_err(|err| {
                ConnectorError::InvalidDeviceProfile(format!("more regex: {err}"))
            })?,
            config_command: spec.config_command,
            exit_config_command: spec.exit_config_command,
            disable_paging: spec.disable_paging,
        })
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    /// Returns true when `line` is any prompt of this family.
    pub fn is_prompt(&self, line: &str) -> bool {
        let matched = self.prompt.is_match(line);
        if matched {
            trace!("prompt matched: {:?}", line);
        }
        matched
    }

    /// Returns true when `line` is a configuration-mode prompt.
    pub fn is_config_prompt(&self, line: &str) -> bool {
        self.config_prompt.is_match(line)
    }

    /// Returns true when `line` is a pagination marker.
    pub fn is_more(&self, line: &str) -> bool {
        self.more.is_match(line)
    }

    pub fn config_command(&self) -> &'static str {
        self.config_command
    }

    pub fn exit_config_command(&self) -> &'static str {
        self.exit_config_command
    }

    /// Command turning off pagination for the session, if the family has one.
    pub fn disable_paging(&self) -> Option<&'static str> {
        self.disable_paging
    }
}

fn prompt_set(patterns: &[&str]) -> Result<RegexSet, ConnectorError> {
    RegexSet::new(
        patterns
            .iter()
            .map(|pattern| format!(r"^\x00*\r{{0,1}}{pattern}")),
    )
    .map_err(|err| ConnectorError::InvalidDeviceProfile(format!("prompt regex: {err}")))
}

/// Carriage-return and backspace runs that terminals emit before redrawn text.
pub static IGNORE_START_LINE: Lazy<Regex> =
    Lazy::new(
        || match Regex::new(r"^(\r+(\s+\r+)*)|(\u{8}+(\s+\u{8}+)*)") {
            Ok(re) => re,
            Err(err) => panic!("invalid IGNORE_START_LINE regex: {err}"),
        },
    );

static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| match Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]") {
    Ok(re) => re,
    Err(err) => panic!("invalid ANSI_ESCAPE regex: {err}"),
});

/// Strips terminal escapes, redraw prefixes and carriage returns from one line.
pub fn clean_line(line: &str) -> String {
    let line = ANSI_ESCAPE.replace_all(line, "");
    IGNORE_START_LINE.replace(&line, "").replace('\r', "")
}
