//! Classification of the files found in a module directory.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

/// Which classification rules to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRuleSet {
    /// Sources and headers only.
    #[default]
    Standard,
    /// Standard rules plus common resource types.
    Extended,
}

/// What a file is to the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    Source,
    Header,
    ProcessedResource,
    CopiedResource,
    Ignored,
}

const STANDARD_RULES: &[(&str, FileKind)] = &[
    ("*.c", FileKind::Source),
    ("*.cc", FileKind::Source),
    ("*.cpp", FileKind::Source),
    ("*.cxx", FileKind::Source),
    ("*.m", FileKind::Source),
    ("*.mm", FileKind::Source),
    ("*.s", FileKind::Source),
    ("*.swift", FileKind::Source),
    ("*.h", FileKind::Header),
    ("*.hh", FileKind::Header),
    ("*.hpp", FileKind::Header),
    ("*.modulemap", FileKind::Header),
    (".*", FileKind::Ignored),
    ("*.md", FileKind::Ignored),
    ("LICENSE*", FileKind::Ignored),
];

const EXTENDED_RULES: &[(&str, FileKind)] = &[
    ("*.xib", FileKind::ProcessedResource),
    ("*.storyboard", FileKind::ProcessedResource),
    ("*.strings", FileKind::ProcessedResource),
    ("*.xcassets", FileKind::ProcessedResource),
    ("*.json", FileKind::CopiedResource),
    ("*.png", FileKind::CopiedResource),
    ("*.txt", FileKind::CopiedResource),
];

fn compile(rules: &[&[(&str, FileKind)]]) -> Vec<(Pattern, FileKind)> {
    rules
        .iter()
        .flat_map(|set| set.iter())
        .filter_map(|(pattern, kind)| Pattern::new(pattern).ok().map(|p| (p, *kind)))
        .collect()
}

static STANDARD: LazyLock<Vec<(Pattern, FileKind)>> = LazyLock::new(|| compile(&[STANDARD_RULES]));

static EXTENDED: LazyLock<Vec<(Pattern, FileKind)>> =
    LazyLock::new(|| compile(&[STANDARD_RULES, EXTENDED_RULES]));

impl FileRuleSet {
    fn rules(&self) -> &'static [(Pattern, FileKind)] {
        match self {
            FileRuleSet::Standard => &STANDARD,
            FileRuleSet::Extended => &EXTENDED,
        }
    }

    /// Classify one file by name. `None` means no rule handles it.
    pub fn classify(&self, path: &Path) -> Option<FileKind> {
        let name = path.file_name()?.to_str()?;
        let options = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        self.rules()
            .iter()
            .find(|(pattern, _)| pattern.matches_with(name, options))
            .map(|(_, kind)| *kind)
    }
}

/// How a resource is brought into the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceRule {
    Process,
    Copy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub path: PathBuf,
    pub rule: ResourceRule,
}

/// Files of a module grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleSources {
    pub sources: Vec<PathBuf>,
    pub headers: Vec<PathBuf>,
    pub resources: Vec<Resource>,
    pub ignored: Vec<PathBuf>,
}

impl ModuleSources {
    /// Group `files` by `rules`, returning the grouping and the files no
    /// rule handled.
    pub fn classify(files: Vec<PathBuf>, rules: FileRuleSet) -> (ModuleSources, Vec<PathBuf>) {
        let mut sources = ModuleSources::default();
        let mut unhandled = Vec::new();

        for file in files {
            match rules.classify(&file) {
                Some(FileKind::Source) => sources.sources.push(file),
                Some(FileKind::Header) => sources.headers.push(file),
                Some(FileKind::ProcessedResource) => sources.resources.push(Resource {
                    path: file,
                    rule: ResourceRule::Process,
                }),
                Some(FileKind::CopiedResource) => sources.resources.push(Resource {
                    path: file,
                    rule: ResourceRule::Copy,
                }),
                Some(FileKind::Ignored) => sources.ignored.push(file),
                None => unhandled.push(file),
            }
        }

        (sources, unhandled)
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
            && self.headers.is_empty()
            && self.resources.is_empty()
            && self.ignored.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_rules() {
        let rules = FileRuleSet::Standard;
        assert_eq!(rules.classify(Path::new("src/main.c")), Some(FileKind::Source));
        assert_eq!(rules.classify(Path::new("include/Kit.H")), Some(FileKind::Header));
        assert_eq!(rules.classify(Path::new(".DS_Store")), Some(FileKind::Ignored));
        assert_eq!(rules.classify(Path::new("data.json")), None);
    }

    #[test]
    fn test_extended_rules_add_resources() {
        let files = vec![
            PathBuf::from("a.c"),
            PathBuf::from("strings.json"),
            PathBuf::from("Main.storyboard"),
            PathBuf::from("blob.bin"),
        ];
        let (sources, unhandled) = ModuleSources::classify(files, FileRuleSet::Extended);
        assert_eq!(sources.sources, vec![PathBuf::from("a.c")]);
        assert_eq!(sources.resources.len(), 2);
        assert_eq!(sources.resources[1].rule, ResourceRule::Process);
        assert_eq!(unhandled, vec![PathBuf::from("blob.bin")]);
    }
}
