//! SARIF 2.1.0 output for CI integration.

use serde_json::json;

use super::diagnostics::{CATEGORY, DESCRIPTION, Diagnostic, TITLE};
use super::proxy::GeneratorDiagnostic;

pub fn build_sarif(
    diagnostics: &[Diagnostic],
    generator_diagnostics: &[GeneratorDiagnostic],
) -> serde_json::Value {
    let mut results = Vec::new();

    for diag in diagnostics {
        results.push(json!({
            "ruleId": diag.id,
            "level": "warning",
            "message": { "text": diag.message },
            "locations": [{
                "physicalLocation": {
                    "artifactLocation": { "uri": diag.file },
                    "region": {
                        "startLine": diag.line,
                        "startColumn": diag.column,
                    }
                }
            }]
        }));
    }

    for diag in generator_diagnostics {
        results.push(json!({
            "ruleId": diag.id,
            "level": "note",
            "message": { "text": diag.message },
        }));
    }

    json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "navlint",
                    "version": env!("CARGO_PKG_VERSION"),
                    "informationUri": "https://github.com/navlint/navlint",
                    "rules": [{
                        "id": super::diagnostics::DIAGNOSTIC_ID,
                        "shortDescription": { "text": TITLE },
                        "fullDescription": { "text": DESCRIPTION },
                        "properties": { "category": CATEGORY },
                    }]
                }
            },
            "results": results
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextSpan;

    #[test]
    fn sarif_carries_rule_and_location() {
        let source = "instance.items";
        let diag = Diagnostic::navigation("a.ts", source, TextSpan::new(9, 14), "items");
        let sarif = build_sarif(std::slice::from_ref(&diag), &[]);
        assert_eq!(sarif["version"], "2.1.0");
        let result = &sarif["runs"][0]["results"][0];
        assert_eq!(result["ruleId"], "EFPA01");
        assert_eq!(
            result["locations"][0]["physicalLocation"]["artifactLocation"]["uri"],
            "a.ts"
        );
    }
}
