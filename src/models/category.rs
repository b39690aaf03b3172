use serde::{Deserialize, Serialize};

/// Predefined topic a subscription can bind to by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub display_name: String,
    pub description: String,
    #[serde(default)]
    pub default_rss: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

struct CategoryDef {
    name: &'static str,
    display_name: &'static str,
    description: &'static str,
    keywords: &'static [&'static str],
    default_rss: &'static [&'static str],
}

const CATEGORIES: &[CategoryDef] = &[
    CategoryDef {
        name: "silicon-chips",
        display_name: "Silicon & Semiconductors",
        description: "Chip fabrication, lithography, semiconductor industry news",
        keywords: &[
            "semiconductor",
            "chip fabrication",
            "TSMC",
            "Intel",
            "Samsung foundry",
            "EUV lithography",
            "nm process node",
        ],
        default_rss: &["https://semianalysis.com/feed/", "https://www.anandtech.com/rss/"],
    },
    CategoryDef {
        name: "rust-lang",
        display_name: "Rust Programming",
        description: "Rust language updates, crates, ecosystem news",
        keywords: &["rust programming", "rust lang", "crates.io", "rust async", "rust embedded"],
        default_rss: &[],
    },
    CategoryDef {
        name: "llm-inference",
        display_name: "LLM & AI Inference",
        description: "Large language models, inference optimization, AI deployment",
        keywords: &[
            "LLM inference",
            "transformer optimization",
            "quantization",
            "GGUF",
            "vLLM",
            "TensorRT-LLM",
        ],
        default_rss: &[],
    },
    CategoryDef {
        name: "webgpu",
        display_name: "WebGPU & Graphics",
        description: "WebGPU, browser graphics, GPU compute on the web",
        keywords: &["WebGPU", "WGSL", "browser GPU", "web graphics"],
        default_rss: &[],
    },
    CategoryDef {
        name: "systems-programming",
        display_name: "Systems Programming",
        description: "OS development, compilers, low-level programming",
        keywords: &[
            "operating systems",
            "compiler design",
            "LLVM",
            "systems programming",
            "kernel",
        ],
        default_rss: &[],
    },
    CategoryDef {
        name: "kubernetes",
        display_name: "Kubernetes & Cloud Native",
        description: "K8s, containers, cloud-native infrastructure",
        keywords: &["kubernetes", "k8s", "containers", "cloud native", "CNCF"],
        default_rss: &[],
    },
];

impl From<&CategoryDef> for Category {
    fn from(def: &CategoryDef) -> Self {
        Self {
            name: def.name.to_string(),
            display_name: def.display_name.to_string(),
            description: def.description.to_string(),
            default_rss: def.default_rss.iter().map(|s| s.to_string()).collect(),
            keywords: def.keywords.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub fn default_categories() -> Vec<Category> {
    CATEGORIES.iter().map(Category::from).collect()
}

/// Exact, case-sensitive lookup in the built-in taxonomy.
pub fn find_category(name: &str) -> Option<Category> {
    CATEGORIES
        .iter()
        .find(|def| def.name == name)
        .map(Category::from)
}
