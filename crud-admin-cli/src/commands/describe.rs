//! Metamodel description command

use anyhow::{bail, Result};
use console::style;
use crud_admin::metamodel::{EntityDescriptor, Metamodel, RuntimeType};

/// Print the metamodel of one entity type
#[derive(Debug, Clone)]
pub struct DescribeCommand {
    type_name: String,
    json: bool,
}

impl DescribeCommand {
    /// Describe `type_name`, as a table or as JSON
    #[must_use]
    pub fn new(type_name: impl Into<String>, json: bool) -> Self {
        Self {
            type_name: type_name.into(),
            json,
        }
    }

    /// Look the type up in `metamodel`.
    ///
    /// Accepts the fully qualified name or, when only one registered type
    /// has it, the last path segment.
    ///
    /// # Errors
    ///
    /// Returns an error if no type, or more than one, matches.
    pub fn resolve<'m>(&self, metamodel: &'m Metamodel) -> Result<&'m EntityDescriptor> {
        if let Ok(entity) = metamodel.entity(&self.type_name) {
            return Ok(entity.descriptor());
        }

        let suffix = format!("::{}", self.type_name);
        let matches: Vec<&EntityDescriptor> = metamodel
            .entities()
            .map(|entity| entity.descriptor())
            .filter(|descriptor| descriptor.type_name().ends_with(&suffix))
            .collect();

        match matches.as_slice() {
            [descriptor] => Ok(*descriptor),
            [] => bail!("No entity type named {}", self.type_name),
            _ => bail!(
                "{} is ambiguous: {}",
                self.type_name,
                matches
                    .iter()
                    .map(|descriptor| descriptor.type_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Render the description
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render(&self, descriptor: &EntityDescriptor) -> Result<String> {
        if self.json {
            return Ok(serde_json::to_string_pretty(descriptor)?);
        }

        let mut out = format!(
            "{} ({}, table {})\n",
            descriptor.type_name(),
            descriptor.marker(),
            descriptor.table()
        );
        for attribute in descriptor.attributes() {
            let runtime_type = match attribute.runtime_type() {
                RuntimeType::Entity(target) => format!("-> {target}"),
                other => format!("{other:?}").to_lowercase(),
            };
            let mut flags = Vec::new();
            if attribute.is_identifier() {
                flags.push("id");
            }
            if attribute.is_nullable() {
                flags.push("nullable");
            }
            out.push_str(&format!(
                "  {:<16} {:<28} {:<12} {}\n",
                attribute.name(),
                runtime_type,
                attribute.accessor_name(),
                flags.join(", ")
            ));
        }
        Ok(out)
    }

    /// Execute the command
    ///
    /// # Errors
    ///
    /// Returns an error if the metamodel is invalid or the type is unknown.
    pub fn execute(&self) -> Result<()> {
        let metamodel = Metamodel::from_inventory()?;
        let descriptor = self.resolve(&metamodel)?;
        let rendered = self.render(descriptor)?;

        if self.json {
            println!("{rendered}");
        } else {
            println!("{}", style(rendered.trim_end()).bold());
        }
        Ok(())
    }
}
