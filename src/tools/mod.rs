//! Tools the agents can call, plus the registry and dispatcher that run them.

mod analysis;
mod calculate;
mod clock;
mod dispatcher;
mod lookup;
mod note;
mod registry;
pub mod schema;
mod traits;
mod weather;

pub use analysis::{AnalyzeDataInput, AnalyzeDataTool};
pub use calculate::{CalculateInput, CalculateTool, evaluate, format_number};
pub use clock::{CurrentTimeInput, CurrentTimeTool};
pub use dispatcher::Dispatcher;
pub(crate) use dispatcher::panic_message;
pub use lookup::{MarketDataInput, MarketDataTool, SearchWebInput, SearchWebTool};
pub use note::{SaveNoteInput, SaveNoteTool};
pub use registry::ToolRegistry;
pub use traits::{FnTool, Tool, TypedTool};
pub use weather::{WeatherInput, WeatherTool};
