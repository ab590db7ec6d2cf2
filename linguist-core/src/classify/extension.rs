use std::collections::HashMap;
use std::path::Path;

use crate::types::LanguageKind;

use super::{FileSample, LanguageClassifier, LanguageTag, looks_binary};

/// Static description of one language the default classifier knows.
#[derive(Debug, Clone, Copy)]
struct LanguageDef {
    id: &'static str,
    kind: LanguageKind,
    extensions: &'static [&'static str],
    filenames: &'static [&'static str],
}

const fn lang(
    id: &'static str,
    kind: LanguageKind,
    extensions: &'static [&'static str],
    filenames: &'static [&'static str],
) -> LanguageDef {
    LanguageDef {
        id,
        kind,
        extensions,
        filenames,
    }
}

use LanguageKind::{Data, Markup, Programming, Prose};

const LANGUAGES: &[LanguageDef] = &[
    lang("rust", Programming, &["rs"], &[]),
    lang("python", Programming, &["py", "pyi", "pyw"], &[]),
    lang("typescript", Programming, &["ts", "tsx", "mts", "cts"], &[]),
    lang("javascript", Programming, &["js", "jsx", "mjs", "cjs"], &[]),
    lang("go", Programming, &["go"], &[]),
    lang("java", Programming, &["java"], &[]),
    lang("kotlin", Programming, &["kt", "kts"], &[]),
    lang("scala", Programming, &["scala", "sc"], &[]),
    lang("groovy", Programming, &["groovy", "gradle"], &["Jenkinsfile"]),
    lang("c", Programming, &["c", "h"], &[]),
    lang("cpp", Programming, &["cpp", "cxx", "cc", "hpp", "hh", "hxx"], &[]),
    lang("csharp", Programming, &["cs"], &[]),
    lang("fsharp", Programming, &["fs", "fsi", "fsx"], &[]),
    lang("objective-c", Programming, &["m", "mm"], &[]),
    lang("swift", Programming, &["swift"], &[]),
    lang("ruby", Programming, &["rb", "rake", "gemspec"], &["Gemfile", "Rakefile"]),
    lang("php", Programming, &["php"], &[]),
    lang("perl", Programming, &["pl", "pm"], &[]),
    lang("lua", Programming, &["lua"], &[]),
    lang("r", Programming, &["r"], &[]),
    lang("dart", Programming, &["dart"], &[]),
    lang("elixir", Programming, &["ex", "exs"], &[]),
    lang("erlang", Programming, &["erl", "hrl"], &[]),
    lang("haskell", Programming, &["hs", "lhs"], &[]),
    lang("ocaml", Programming, &["ml", "mli"], &[]),
    lang("clojure", Programming, &["clj", "cljs", "cljc", "edn"], &[]),
    lang("zig", Programming, &["zig"], &[]),
    lang("nix", Programming, &["nix"], &[]),
    lang("shell", Programming, &["sh", "bash", "zsh"], &[]),
    lang("powershell", Programming, &["ps1", "psm1"], &[]),
    lang("batchfile", Programming, &["bat", "cmd"], &[]),
    lang("sql", Data, &["sql"], &[]),
    lang("hcl", Programming, &["tf", "hcl"], &[]),
    lang("vue", Markup, &["vue"], &[]),
    lang("svelte", Markup, &["svelte"], &[]),
    lang("html", Markup, &["html", "htm"], &[]),
    lang("css", Markup, &["css"], &[]),
    lang("scss", Markup, &["scss", "sass"], &[]),
    lang("tex", Markup, &["tex"], &[]),
    lang("dockerfile", Programming, &["dockerfile"], &["Dockerfile", "Containerfile"]),
    lang("makefile", Programming, &["mk", "mak"], &["Makefile", "GNUmakefile"]),
    lang("cmake", Programming, &["cmake"], &["CMakeLists.txt"]),
    lang("protobuf", Data, &["proto"], &[]),
    lang("graphql", Data, &["graphql", "gql"], &[]),
    lang("json", Data, &["json"], &[]),
    lang("yaml", Data, &["yaml", "yml"], &[]),
    lang("toml", Data, &["toml"], &["Cargo.lock"]),
    lang("xml", Data, &["xml", "xsd"], &[]),
    lang("csv", Data, &["csv", "tsv"], &[]),
    lang("markdown", Prose, &["md", "markdown", "mdx"], &[]),
    lang("restructuredtext", Prose, &["rst"], &[]),
    lang("asciidoc", Prose, &["adoc", "asciidoc"], &[]),
    lang("text", Prose, &["txt"], &[]),
];

/// Default classifier: maps file extensions and well-known file names to
/// languages, attributing the whole file to one language.
///
/// Files with content that looks binary are not attributed. Size-only
/// samples are classified by name and counted at their full size.
#[derive(Debug)]
pub struct ExtensionClassifier {
    by_extension: HashMap<&'static str, usize>,
    by_filename: HashMap<&'static str, usize>,
}

impl ExtensionClassifier {
    pub fn new() -> Self {
        let mut by_extension = HashMap::new();
        let mut by_filename = HashMap::new();
        for (idx, def) in LANGUAGES.iter().enumerate() {
            for ext in def.extensions {
                by_extension.insert(*ext, idx);
            }
            for name in def.filenames {
                by_filename.insert(*name, idx);
            }
        }
        Self {
            by_extension,
            by_filename,
        }
    }

    fn lookup(&self, path: &str) -> Option<&'static LanguageDef> {
        let path = Path::new(path);
        let file_name = path.file_name()?.to_str()?;
        if let Some(idx) = self.by_filename.get(file_name) {
            return LANGUAGES.get(*idx);
        }
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let idx = self.by_extension.get(ext.as_str())?;
        LANGUAGES.get(*idx)
    }

    /// List all known language ids.
    pub fn language_ids(&self) -> Vec<&'static str> {
        LANGUAGES.iter().map(|l| l.id).collect()
    }
}

impl Default for ExtensionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageClassifier for ExtensionClassifier {
    fn classify(&self, path: &str, sample: FileSample<'_>) -> Vec<LanguageTag> {
        let Some(def) = self.lookup(path) else {
            return Vec::new();
        };
        if sample.content.is_some_and(looks_binary) {
            return Vec::new();
        }
        vec![LanguageTag {
            language: def.id.to_string(),
            kind: def.kind,
            bytes: sample.size,
        }]
    }
}
