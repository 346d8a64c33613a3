use jni::objects::{JClass, JFieldID, JMethodID, JObject, JObjectArray, JValue};
use jni::JNIEnv;

use crate::classifier::Keyword;

pub const KEYWORD_CLASS: &str = "org/imgclass/Keyword";
const KEYWORD_FIELD: (&str, &str) = ("keyword", "Ljava/lang/String;");
const CONFIDENCE_FIELD: (&str, &str) = ("confidence", "F");

/// Descriptors of the host's `Keyword` result class.
///
/// Only valid for the call and thread they were resolved on: the class is a
/// local reference and `FindClass` goes through the calling thread's loader.
/// The `'local` lifetime ties them to the native frame that resolved them, so
/// they cannot be stored across calls; every classification resolves afresh.
pub struct KeywordClass<'local> {
    class: JClass<'local>,
    ctor: JMethodID,
    keyword: JFieldID,
    confidence: JFieldID,
}

impl<'local> KeywordClass<'local> {
    /// Looks up the class, its no-argument constructor and both fields.
    ///
    /// A failed lookup leaves the host's `NoClassDefFoundError`,
    /// `NoSuchMethodError` or `NoSuchFieldError` pending.
    pub fn resolve(env: &mut JNIEnv<'local>) -> jni::errors::Result<Self> {
        let class = env.find_class(KEYWORD_CLASS).map_err(|e| {
            log::error!("Result class {} not found: {}", KEYWORD_CLASS, e);
            e
        })?;
        let ctor = env.get_method_id(&class, "<init>", "()V").map_err(|e| {
            log::error!("No default constructor on {}: {}", KEYWORD_CLASS, e);
            e
        })?;
        let keyword = env.get_field_id(&class, KEYWORD_FIELD.0, KEYWORD_FIELD.1).map_err(|e| {
            log::error!("Field {}.{} not found: {}", KEYWORD_CLASS, KEYWORD_FIELD.0, e);
            e
        })?;
        let confidence = env.get_field_id(&class, CONFIDENCE_FIELD.0, CONFIDENCE_FIELD.1).map_err(|e| {
            log::error!("Field {}.{} not found: {}", KEYWORD_CLASS, CONFIDENCE_FIELD.0, e);
            e
        })?;
        Ok(Self {
            class,
            ctor,
            keyword,
            confidence,
        })
    }

    /// Builds one `Keyword` instance. The caller owns the returned local reference.
    pub fn new_keyword(&self, env: &mut JNIEnv<'local>, keyword: &Keyword) -> jni::errors::Result<JObject<'local>> {
        // Safety: `ctor` was resolved on `class` with signature ()V and takes no arguments
        let object = unsafe { env.new_object_unchecked(&self.class, self.ctor, &[]) }?;
        let text = env.new_string(&keyword.keyword)?;
        // Safety: both field ids belong to `class` and the values match their signatures
        unsafe {
            env.set_field_unchecked(&object, self.keyword, JValue::Object(&text))?;
            env.set_field_unchecked(&object, self.confidence, JValue::Float(keyword.confidence))?;
        }
        env.delete_local_ref(text)?;
        Ok(object)
    }

    /// Builds a `Keyword[]` holding `keywords` in order.
    ///
    /// Each element's local reference is released as soon as it is stored, so
    /// the frame needs room for one element, one string and the array.
    pub fn new_array(&self, env: &mut JNIEnv<'local>, keywords: &[Keyword]) -> jni::errors::Result<JObjectArray<'local>> {
        let len = i32::try_from(keywords.len()).map_err(|_| jni::errors::Error::WrongJValueType("usize", "jsize"))?;
        let array = env.new_object_array(len, &self.class, JObject::null())?;
        for (index, keyword) in (0..len).zip(keywords) {
            let object = self.new_keyword(env, keyword)?;
            env.set_object_array_element(&array, index, &object)?;
            env.delete_local_ref(object)?;
        }
        Ok(array)
    }
}
