/// A language as the pipeline sees it: the folder/header name used on disk
/// (`french`, `simp_chinese`) and the code a provider expects (`FR`, `ZH`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language {
    pub name: String,
    pub code: String,
}

impl Language {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Language {
            name: name.into(),
            code: code.into(),
        }
    }

    /// The `l_<name>` tag used in headers and file names
    pub fn tag(&self) -> String {
        format!("l_{}", self.name)
    }

    /// Human-readable name for prompts, e.g. `braz_por` -> `Brazilian Portuguese`
    pub fn display_name(&self) -> String {
        display_name(&self.name)
    }
}

pub fn display_name(name: &str) -> String {
    let known = match name {
        "english" => Some("English"),
        "french" => Some("French"),
        "german" => Some("German"),
        "spanish" => Some("Spanish"),
        "polish" => Some("Polish"),
        "russian" => Some("Russian"),
        "simp_chinese" => Some("Simplified Chinese"),
        "trad_chinese" => Some("Traditional Chinese"),
        "turkish" => Some("Turkish"),
        "braz_por" => Some("Brazilian Portuguese"),
        "japanese" => Some("Japanese"),
        "korean" => Some("Korean"),
        _ => None,
    };
    if let Some(known) = known {
        return known.to_string();
    }

    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
