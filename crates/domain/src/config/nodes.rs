use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Flow node definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Initial configuration of one flow node, tagged by `type`.
///
/// ```toml
/// [[nodes]]
/// type = "function"
/// id = "led"
/// devid = "{payload.device}"
/// fname = "led"
/// repeat = 0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeDefinition {
    Utility(UtilityNodeConfig),
    Publish(PublishNodeConfig),
    Function(FunctionNodeConfig),
    Variable(VariableNodeConfig),
    Events(EventsNodeConfig),
}

impl NodeDefinition {
    pub fn id(&self) -> &str {
        match self {
            Self::Utility(c) => &c.id,
            Self::Publish(c) => &c.id,
            Self::Function(c) => &c.id,
            Self::Variable(c) => &c.id,
            Self::Events(c) => &c.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Utility(_) => "utility",
            Self::Publish(_) => "publish",
            Self::Function(_) => "function",
            Self::Variable(_) => "variable",
            Self::Events(_) => "events",
        }
    }

    /// Whether the node cannot do anything useful without a device id.
    pub fn requires_device(&self) -> bool {
        match self {
            Self::Function(_) | Self::Variable(_) => true,
            Self::Utility(c) => c.utility != UtilityKind::ListDevices,
            Self::Publish(_) => false,
            Self::Events(c) => c.subscribe == SubscribeKind::Devid,
        }
    }

    pub fn device_spec(&self) -> &str {
        match self {
            Self::Utility(c) => &c.devid,
            Self::Function(c) => &c.devid,
            Self::Variable(c) => &c.devid,
            Self::Events(c) => &c.devprodslug,
            Self::Publish(_) => "",
        }
    }

    /// Event, function or variable name sent to the cloud, if any.
    pub fn remote_name(&self) -> Option<&str> {
        match self {
            Self::Publish(c) => Some(&c.evtname),
            Self::Function(c) => Some(&c.fname),
            Self::Variable(c) => Some(&c.getvar),
            Self::Events(c) => Some(&c.evtname),
            Self::Utility(_) => None,
        }
    }
}

/// Device-management call performed by a utility node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UtilityKind {
    ListDevices,
    GetDevice,
    SignalDevice,
    NameDevice,
    ClaimDevice,
    AddDeviceToProduct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilityNodeConfig {
    pub id: String,
    pub utility: UtilityKind,
    /// Literal device id or `{path}` into the triggering message.
    #[serde(default)]
    pub devid: String,
    #[serde(default)]
    pub product_id_or_slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishNodeConfig {
    pub id: String,
    #[serde(default)]
    pub evtname: String,
    #[serde(default)]
    pub param: String,
    #[serde(default)]
    pub product_id_or_slug: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default = "d_60")]
    pub ttl: u32,
    /// Seconds between repeated publishes; `0` disables repeating.
    #[serde(default)]
    pub repeat: f64,
    #[serde(default)]
    pub once: bool,
    /// Take the event name from `msg.topic` and the data from `msg.payload`.
    #[serde(default)]
    pub evtnametopic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionNodeConfig {
    pub id: String,
    #[serde(default)]
    pub devid: String,
    #[serde(default)]
    pub fname: String,
    /// Literal argument or `{path}` into the triggering message.
    #[serde(default)]
    pub param: String,
    #[serde(default)]
    pub product_id_or_slug: Option<String>,
    #[serde(default)]
    pub repeat: f64,
    #[serde(default)]
    pub once: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableNodeConfig {
    pub id: String,
    #[serde(default)]
    pub devid: String,
    #[serde(default)]
    pub getvar: String,
    #[serde(default)]
    pub product_id_or_slug: Option<String>,
    #[serde(default)]
    pub repeat: f64,
    #[serde(default)]
    pub once: bool,
}

/// How an event stream subscription is scoped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscribeKind {
    /// A single device, named by `devprodslug`.
    Devid,
    /// All devices owned by the token's account.
    #[default]
    Mine,
    /// Public firehose.
    All,
    ProductIdOrSlug,
    OrgSlug,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsNodeConfig {
    pub id: String,
    #[serde(default)]
    pub subscribe: SubscribeKind,
    /// Device id, product id/slug or org slug depending on `subscribe`.
    #[serde(default)]
    pub devprodslug: String,
    /// Event name prefix; empty subscribes to every event.
    #[serde(default)]
    pub evtname: String,
    /// Only forward events whose name equals `evtname` exactly.
    #[serde(default)]
    pub strict: bool,
}

fn d_60() -> u32 {
    60
}
