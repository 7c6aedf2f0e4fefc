//! Namespace-aware DOM tree comparison of XML payloads.
//!
//! Elements are matched by local name and namespace URI, children in order.
//! Comments and processing instructions are skipped, and text is compared
//! trimmed. Failures name the element by its dot separated ancestor chain
//! (`root.element.sub-element`).

use super::xpath::parse_document;
use super::{MessageValidator, control_payload, validate_value_with};
use crate::context::TestContext;
use crate::enums::MessageType;
use crate::error::{ValidationError, value_mismatch};
use crate::matcher;
use crate::message::Message;
use crate::placeholder::{self, IGNORE_PLACEHOLDER};
use crate::validation_context::{ValidationContext, XmlValidationContext, xml_context};
use crate::xpath::{XmlNode, select_nodes};
use roxmltree::{Attribute, Document, Node};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Every namespace declaration in the document, prefix to URI.
///
/// The default namespace uses the empty prefix; the first declaration of a
/// prefix wins.
pub fn lookup_namespaces(document: &Document<'_>) -> BTreeMap<String, String> {
    let mut namespaces = BTreeMap::new();
    for node in document.descendants().filter(|n| n.is_element()) {
        for ns in node.namespaces() {
            let prefix = ns.name().unwrap_or_default();
            if prefix == "xml" {
                continue;
            }
            namespaces
                .entry(prefix.to_string())
                .or_insert_with(|| ns.uri().to_string());
        }
    }
    namespaces
}

/// Dot separated local names from the root element down to `node`.
pub fn node_path(node: Node<'_, '_>) -> String {
    let mut names: Vec<&str> = node
        .ancestors()
        .filter(|n| n.is_element())
        .map(|n| n.tag_name().name())
        .collect();
    names.reverse();
    names.join(".")
}

/// Concatenated direct text children.
fn text_value(node: Node<'_, '_>) -> String {
    node.children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

fn child_elements<'a, 'input>(node: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
    node.children().filter(|n| n.is_element()).collect()
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DomXmlMessageValidator;

impl DomXmlMessageValidator {
    /// Checks the namespace declarations of the received document.
    pub fn validate_namespaces(
        &self,
        expected: &BTreeMap<String, String>,
        received: &Message,
    ) -> Result<(), ValidationError> {
        if expected.is_empty() {
            return Ok(());
        }
        let payload = received.payload_text();
        if payload.trim().is_empty() {
            return Err(ValidationError::mismatch(
                "Unable to validate message namespaces - receive message payload was empty",
            ));
        }
        debug!("Start XML namespace validation");

        let document = parse_document(&payload)?;
        let root = node_path(document.root_element());
        let found = lookup_namespaces(&document);

        if found.len() != expected.len() {
            return Err(ValidationError::mismatch(format!(
                "Number of namespace declarations not equal for node {} found {} expected {}",
                root,
                found.len(),
                expected.len()
            )));
        }
        for (prefix, uri) in expected {
            match found.get(prefix) {
                Some(actual) if actual == uri => {
                    debug!(prefix = prefix.as_str(), uri = uri.as_str(), "namespace value as expected");
                }
                Some(actual) => {
                    return Err(ValidationError::mismatch(format!(
                        "Namespace '{}' values not equal: found '{}' expected '{}' in reference node {}",
                        prefix, actual, uri, root
                    )));
                }
                None => {
                    return Err(ValidationError::mismatch(format!(
                        "Missing namespace {}({}) in node {}",
                        prefix, uri, root
                    )));
                }
            }
        }

        info!("XML namespace validation successful: All values OK");
        Ok(())
    }

    /// Compares two XML documents element by element.
    pub fn validate_documents(
        &self,
        received: &str,
        control: &str,
        validation_context: &XmlValidationContext,
        context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        let received = parse_document(received)?;
        let control = parse_document(control)?;

        let mut ignored = Vec::new();
        for expression in &validation_context.ignore_expressions {
            ignored.extend(select_nodes(&received, expression, &validation_context.namespaces)?);
        }

        let walker = TreeWalker { ignored: &ignored };
        walker.element(received.root_element(), control.root_element(), context)
    }
}

struct TreeWalker<'w, 'a, 'input> {
    ignored: &'w [XmlNode<'a, 'input>],
}

impl<'a, 'input> TreeWalker<'_, 'a, 'input> {
    fn element(
        &self,
        received: Node<'a, 'input>,
        control: Node<'_, '_>,
        context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        let path = node_path(received);
        let name = received.tag_name();
        debug!(element = name.name(), namespace = ?name.namespace(), "validating element");

        if name.name() != control.tag_name().name() {
            return Err(value_mismatch(
                &format!("Element names not equal for element '{}'", path),
                control.tag_name().name(),
                name.name(),
            ));
        }
        if name.namespace() != control.tag_name().namespace() {
            return Err(value_mismatch(
                &format!("Element namespace not equal for element '{}'", path),
                control.tag_name().namespace().unwrap_or("null"),
                name.namespace().unwrap_or("null"),
            ));
        }

        let control_text = text_value(control);
        if control_text.trim() == IGNORE_PLACEHOLDER || self.ignored.contains(&XmlNode::Node(received)) {
            debug!(element = path.as_str(), "element is ignored");
            return Ok(());
        }

        let received_attributes = received.attributes().len();
        let control_attributes = control.attributes().len();
        if received_attributes != control_attributes {
            return Err(value_mismatch(
                &format!("Number of attributes not equal for element '{}'", path),
                control_attributes,
                received_attributes,
            ));
        }
        for (index, attribute) in received.attributes().enumerate() {
            self.attribute(received, index, attribute, control, &path, context)?;
        }

        let received_text = text_value(received);
        let received_text = received_text.trim();
        let expected = context.replace_dynamic_content(control_text.trim())?;
        let expected = placeholder::resolve(&expected, received_text, context)?;
        if matcher::is_matcher_expression(&expected) {
            return matcher::resolve(&path, received_text, &expected, context);
        }
        if received_text != expected {
            return Err(value_mismatch(
                &format!("Node value not equal for element '{}'", path),
                expected,
                received_text,
            ));
        }

        let received_children = child_elements(received);
        let control_children = child_elements(control);
        if received_children.len() != control_children.len() {
            return Err(value_mismatch(
                &format!("Number of child elements not equal for element '{}'", path),
                control_children.len(),
                received_children.len(),
            ));
        }
        for (received_child, control_child) in received_children.into_iter().zip(control_children) {
            self.element(received_child, control_child, context)?;
        }

        debug!(element = path.as_str(), "validation successful for element");
        Ok(())
    }

    fn attribute(
        &self,
        received_element: Node<'a, 'input>,
        index: usize,
        received: Attribute<'_, '_>,
        control_element: Node<'_, '_>,
        path: &str,
        context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        let name = received.name();
        let control = control_element
            .attributes()
            .find(|a| a.name() == name && a.namespace() == received.namespace())
            .ok_or_else(|| {
                ValidationError::mismatch(format!(
                    "Attribute validation failed for element '{}', unknown attribute {} ({})",
                    path,
                    name,
                    received.namespace().unwrap_or("null")
                ))
            })?;

        let control_value = control.value().trim();
        let ignored = self.ignored.contains(&XmlNode::Attribute {
            owner: received_element,
            index,
        });
        if control_value == IGNORE_PLACEHOLDER || ignored {
            debug!(attribute = name, "attribute is ignored");
            return Ok(());
        }

        let attribute_path = format!("{}.{}", path, name);
        let base = format!("Values not equal for attribute '{}'", attribute_path);
        let received_value = received.value();
        if received_value.contains(':')
            && control_value.contains(':')
            && !matcher::is_matcher_expression(control_value)
        {
            let (received_value, control_value) = qualified_values(
                received_element,
                received_value,
                control_element,
                control_value,
                name,
            )?;
            if received_value != control_value {
                return Err(value_mismatch(&base, control_value, received_value));
            }
        } else {
            validate_value_with(&base, &attribute_path, received_value, control_value, context)?;
        }

        debug!(attribute = name, value = received_value, "attribute value OK");
        Ok(())
    }
}

/// Strips bound namespace prefixes from QName attribute values after checking
/// that both prefixes resolve to the same URI.
fn qualified_values<'v>(
    received_element: Node<'_, '_>,
    received_value: &'v str,
    control_element: Node<'_, '_>,
    control_value: &'v str,
    attribute: &str,
) -> Result<(&'v str, &'v str), ValidationError> {
    let (received_prefix, received_local) = received_value.split_once(':').unwrap_or(("", received_value));
    let (control_prefix, control_local) = control_value.split_once(':').unwrap_or(("", control_value));

    let Some(received_uri) = received_element.lookup_namespace_uri(Some(received_prefix)) else {
        return Ok((received_value, control_value));
    };
    let control_uri = control_element
        .lookup_namespace_uri(Some(control_prefix))
        .ok_or_else(|| {
            ValidationError::mismatch(format!(
                "Received attribute value '{}' describes namespace qualified attribute value, control value '{}' does not",
                attribute, control_value
            ))
        })?;
    if received_uri != control_uri {
        return Err(value_mismatch(
            &format!("Values not equal for attribute value namespace '{}'", received_value),
            control_uri,
            received_uri,
        ));
    }
    Ok((received_local, control_local))
}

impl MessageValidator for DomXmlMessageValidator {
    fn name(&self) -> &str {
        "defaultXmlMessageValidator"
    }

    fn supports_message_type(&self, message_type: &str, message: &Message) -> bool {
        (MessageType::Xml.matches(message_type) || MessageType::Xhtml.matches(message_type))
            && (message.payload.is_empty() || message.has_xml_payload())
    }

    fn validate_message(
        &self,
        received: &Message,
        control: Option<&Message>,
        context: &mut TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        debug!("Start XML message validation");
        let validation_context = xml_context(validation_contexts).cloned().unwrap_or_default();

        self.validate_namespaces(&validation_context.control_namespaces, received)?;

        let Some(control) = control_payload(control) else {
            debug!("Skip message payload validation as no control message was defined");
            return Ok(());
        };
        let control = context.replace_dynamic_content(&control)?;
        let payload = received.payload_text();
        if payload.trim().is_empty() {
            return Err(ValidationError::mismatch(
                "Unable to validate message payload - received message payload was empty, control message payload is not",
            ));
        }

        debug!("Start XML tree validation");
        self.validate_documents(&payload, &control, &validation_context, context)?;

        info!("XML message validation successful: All values OK");
        Ok(())
    }
}
