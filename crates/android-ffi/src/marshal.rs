//! Checked conversion between Java objects and plain Rust values.
//!
//! Every type is checked with `IsInstanceOf` before it is unboxed; a value of
//! an unexpected class is reported with its class name instead of being cast.

use attestbridge_attestation::{FieldValue, ForeignRecord, ForeignValue};
use jni::objects::{JList, JMap, JObject, JString, JValue};
use jni::JNIEnv;
use std::collections::BTreeMap;

use crate::error::BridgeError;

const STRING: &str = "java/lang/String";
const LONG: &str = "java/lang/Long";
const INTEGER: &str = "java/lang/Integer";
const BOOLEAN: &str = "java/lang/Boolean";
const LIST: &str = "java/util/List";

pub fn string_from(env: &mut JNIEnv<'_>, obj: JObject<'_>) -> Result<String, BridgeError> {
    if obj.is_null() {
        return Err(BridgeError::marshal("expected java.lang.String, got null"));
    }
    if !env.is_instance_of(&obj, STRING)? {
        let class = class_name(env, &obj)?;
        return Err(BridgeError::marshal(format!(
            "expected java.lang.String, got {}",
            class
        )));
    }
    let jstr = JString::from(obj);
    let value: String = env.get_string(&jstr)?.into();
    Ok(value)
}

fn class_name(env: &mut JNIEnv<'_>, obj: &JObject<'_>) -> Result<String, BridgeError> {
    let class = env.get_object_class(obj)?;
    let name = env
        .call_method(&class, "getName", "()Ljava/lang/String;", &[])?
        .l()?;
    let jstr = JString::from(name);
    let value: String = env.get_string(&jstr)?.into();
    Ok(value)
}

/// Copy one boxed Java value. Lists are copied element by element.
pub fn value_from(env: &mut JNIEnv<'_>, obj: &JObject<'_>) -> Result<ForeignValue, BridgeError> {
    if obj.is_null() {
        return Ok(ForeignValue::Null);
    }

    if env.is_instance_of(obj, STRING)? {
        let jstr: &JString = obj.into();
        let value: String = env.get_string(jstr)?.into();
        return Ok(ForeignValue::Str(value));
    }
    if env.is_instance_of(obj, LONG)? {
        let value = env.call_method(obj, "longValue", "()J", &[])?.j()?;
        return Ok(ForeignValue::Long(value));
    }
    if env.is_instance_of(obj, INTEGER)? {
        let value = env.call_method(obj, "intValue", "()I", &[])?.i()?;
        return Ok(ForeignValue::Int(value));
    }
    if env.is_instance_of(obj, BOOLEAN)? {
        let value = env.call_method(obj, "booleanValue", "()Z", &[])?.z()?;
        return Ok(ForeignValue::Bool(value));
    }
    if env.is_instance_of(obj, LIST)? {
        let list = JList::from_env(env, obj)?;
        let mut items = Vec::new();
        let mut iter = list.iter(env)?;
        while let Some(item) = iter.next(env)? {
            items.push(value_from(env, &item)?);
            env.delete_local_ref(item)?;
        }
        return Ok(ForeignValue::List(items));
    }

    Ok(ForeignValue::Other(class_name(env, obj)?))
}

/// Copy a `java.util.Map<String, ?>` into a [`ForeignRecord`].
pub fn record_from_map(env: &mut JNIEnv<'_>, map: &JObject<'_>) -> Result<ForeignRecord, BridgeError> {
    if map.is_null() {
        return Err(BridgeError::marshal("generateAttestation returned null"));
    }

    let jmap = JMap::from_env(env, map)?;
    let mut record = ForeignRecord::new();
    let mut iter = jmap.iter(env)?;
    while let Some((key, value)) = iter.next(env)? {
        let key = string_from(env, key)
            .map_err(|e| BridgeError::marshal(format!("attestation map key: {}", e)))?;
        let value_copy = value_from(env, &value)?;
        env.delete_local_ref(value)?;
        record.insert(key, value_copy);
    }
    Ok(record)
}

fn boxed<'local>(
    env: &mut JNIEnv<'local>,
    value: &FieldValue,
) -> Result<JObject<'local>, BridgeError> {
    let obj = match value {
        FieldValue::Text(text) => JObject::from(env.new_string(text)?),
        FieldValue::TextList(items) => {
            let list_obj = env.new_object("java/util/ArrayList", "()V", &[])?;
            let list = JList::from_env(env, &list_obj)?;
            for item in items {
                let jitem = env.new_string(item)?;
                list.add(env, &jitem)?;
                env.delete_local_ref(jitem)?;
            }
            list_obj
        }
        FieldValue::Integer(value) => env.new_object(LONG, "(J)V", &[JValue::Long(*value)])?,
        FieldValue::Bool(value) => {
            env.new_object(BOOLEAN, "(Z)V", &[JValue::Bool(u8::from(*value))])?
        }
    };
    Ok(obj)
}

/// Build a `java.util.HashMap<String, Object>` from a structured map.
pub fn map_from_fields<'local>(
    env: &mut JNIEnv<'local>,
    fields: &BTreeMap<&'static str, FieldValue>,
) -> Result<JObject<'local>, BridgeError> {
    let map_obj = env.new_object("java/util/HashMap", "()V", &[])?;
    let map = JMap::from_env(env, &map_obj)?;
    for (key, value) in fields {
        let jkey = env.new_string(key)?;
        let jvalue = boxed(env, value)?;
        if let Some(previous) = map.put(env, &jkey, &jvalue)? {
            env.delete_local_ref(previous)?;
        }
        env.delete_local_ref(jkey)?;
        env.delete_local_ref(jvalue)?;
    }
    Ok(map_obj)
}
