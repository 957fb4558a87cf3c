//! Derivation of identifiers from registry type names.

/// Derives the structure-type tag from a struct name.
///
/// `VkPhysicalDeviceRobustness2FeaturesEXT` becomes `VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_ROBUSTNESS_2_FEATURES_EXT`.
///
/// The registry is not entirely regular, e.g. `VkPhysicalDeviceVulkan11Features` is tagged
/// `..._VULKAN_1_1_FEATURES`, so a declared tag always wins over this derivation.
#[inline]
#[must_use]
pub fn structure_type_from_name(name: &str) -> String {
    let mut tag = String::from("VK_STRUCTURE_TYPE_");
    let mut previous_lower = false;
    let mut previous_digit = false;
    for character in name.strip_prefix("Vk").unwrap_or(name).chars() {
        let boundary = (character.is_ascii_uppercase() && (previous_lower || previous_digit))
            || (character.is_ascii_digit() && previous_lower);
        if boundary {
            tag.push('_');
        }
        tag.push(character.to_ascii_uppercase());
        previous_lower = character.is_ascii_lowercase();
        previous_digit = character.is_ascii_digit();
    }
    tag
}

/// Converts `CamelCase` to `snake_case`, keeping acronyms together.
#[inline]
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let characters: Vec<char> = name.chars().collect();
    let mut snake = String::with_capacity(name.len() + 4);
    for (index, character) in characters.iter().copied().enumerate() {
        if index > 0 {
            let previous = characters.get(index - 1).copied().unwrap_or_default();
            let next_is_lower = characters
                .get(index + 1)
                .is_some_and(char::is_ascii_lowercase);
            let boundary = if character.is_ascii_uppercase() {
                previous.is_ascii_lowercase() || previous.is_ascii_digit() || next_is_lower
            } else {
                character.is_ascii_digit() && previous.is_ascii_lowercase()
            };
            if boundary {
                snake.push('_');
            }
        }
        snake.push(character.to_ascii_lowercase());
    }
    snake
}

/// The accessor an emitter generates for a record.
///
/// `VkPhysicalDevicePushDescriptorPropertiesKHR` becomes `get_push_descriptor_properties_khr`.
#[inline]
#[must_use]
pub fn accessor_name(record: &str) -> String {
    let short = record.strip_prefix("Vk").unwrap_or(record);
    let short = short.strip_prefix("PhysicalDevice").unwrap_or(short);
    format!("get_{}", to_snake_case(short))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn structure_types() {
        assert_eq!(
            structure_type_from_name("VkPhysicalDeviceRobustness2FeaturesEXT"),
            "VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_ROBUSTNESS_2_FEATURES_EXT"
        );
        assert_eq!(
            structure_type_from_name("VkPhysicalDevicePushDescriptorProperties"),
            "VK_STRUCTURE_TYPE_PHYSICAL_DEVICE_PUSH_DESCRIPTOR_PROPERTIES"
        );
    }

    #[test_log::test]
    fn accessors() {
        assert_eq!(
            accessor_name("VkPhysicalDevicePushDescriptorPropertiesKHR"),
            "get_push_descriptor_properties_khr"
        );
        assert_eq!(accessor_name("VkPhysicalDeviceProperties2"), "get_properties_2");
        assert_eq!(
            accessor_name("VkPhysicalDeviceVulkan12Features"),
            "get_vulkan_12_features"
        );
    }

    #[test_log::test]
    fn snake_case_keeps_acronyms() {
        assert_eq!(to_snake_case("shaderFloat16"), "shader_float_16");
        assert_eq!(to_snake_case("IDProperties"), "id_properties");
        assert_eq!(to_snake_case("subgroupSize"), "subgroup_size");
    }
}
