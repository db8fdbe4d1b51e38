//! Crd command - print the HelmRelease CustomResourceDefinition

use deckhand_core::HelmRelease;
use kube::CustomResourceExt;

use crate::error::Result;

/// Render the CRD as YAML
pub fn render() -> Result<String> {
    Ok(serde_yaml::to_string(&HelmRelease::crd())?)
}

/// Run the crd command
pub fn run() -> Result<()> {
    print!("{}", render()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_crd() {
        let yaml = render().unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(doc["kind"], "CustomResourceDefinition");
        assert_eq!(doc["metadata"]["name"], "helmreleases.deckhand.io");
        assert_eq!(doc["spec"]["names"]["shortNames"][0], "rls");
    }
}
