// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

/// Declare a remote HTTP interface.
///
/// Generates a client struct holding a [`Pipeline`](crate::pipeline::Pipeline),
/// its [`ClientDeclaration`](crate::registry::ClientDeclaration) and one
/// `async fn` per declared method.
///
/// ```ignore
/// remote_client! {
///     /// Items service.
///     pub client ItemsApi("items", url = "http://items:8080", path = "/api") {
///         GET "/items/{id}" => fn item(path id: u64, query("verbose") verbose: bool) -> Item;
///         POST "/items" headers("X-Source" = "courier") => fn create(body item: Item) -> Item;
///     }
/// }
/// ```
///
/// Parameter bindings: `path`, `path("key")`, `query`, `query("key")`,
/// `header("Name")` and `body`. Without a key the parameter name is used.
#[macro_export]
macro_rules! remote_client {
    (
        $(#[$meta:meta])*
        $vis:vis client $client:ident ( $name:literal $(, url = $url:literal)? $(, path = $prefix:literal)? $(,)? ) {
            $(
                $(#[$mmeta:meta])*
                $verb:ident $path:literal $( headers( $( $hname:literal = $hvalue:literal ),* $(,)? ) )?
                    => fn $method:ident ( $( $binding:ident $( ( $key:literal ) )? $arg:ident : $argty:ty ),* $(,)? ) -> $ret:ty ;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug)]
        $vis struct $client {
            pipeline: $crate::pipeline::Pipeline,
        }

        impl $crate::registry::ClientDeclaration for $client {
            const NAME: &'static str = $name;

            fn declaration() -> $crate::contract::InterfaceDecl {
                #[allow(unused_mut)]
                let mut decl = $crate::contract::InterfaceDecl::new(stringify!($client), $name)
                    .with_namespace(module_path!());
                $( decl = decl.with_url($url); )?
                $( decl = decl.with_path_prefix($prefix); )?
                $(
                    decl = decl.with_method(
                        $crate::contract::MethodDecl::new(
                            stringify!($method),
                            $crate::http::Method::$verb,
                            $path,
                            $crate::contract::ReturnType::deferred(
                                $crate::contract::ReturnType::value::<$ret>(),
                            ),
                        )
                        .with_payload_check($crate::contract::PayloadCheck::of::<$ret>())
                        $( .with_param($crate::__courier_param!($binding, $arg, $argty $(, $key)?)) )*
                        $( $( .with_header($hname, $hvalue) )* )?
                    );
                )*
                decl
            }

            fn from_pipeline(pipeline: $crate::pipeline::Pipeline) -> Self {
                $client { pipeline }
            }
        }

        impl $client {
            pub fn pipeline(&self) -> &$crate::pipeline::Pipeline {
                &self.pipeline
            }

            $(
                $(#[$mmeta])*
                pub async fn $method(&self, $( $arg: $argty ),*) -> ::std::result::Result<$ret, $crate::errors::CallError> {
                    let args = $crate::contract::Arguments::new()
                        $( .with(stringify!($arg), &$arg)? )*;
                    self.pipeline.invoke::<$ret>(stringify!($method), args).await
                }
            )*
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __courier_param {
    (path, $arg:ident, $ty:ty) => {
        $crate::contract::ParamDecl::path::<$ty>(stringify!($arg), stringify!($arg))
    };
    (path, $arg:ident, $ty:ty, $key:literal) => {
        $crate::contract::ParamDecl::path::<$ty>(stringify!($arg), $key)
    };
    (query, $arg:ident, $ty:ty) => {
        $crate::contract::ParamDecl::query::<$ty>(stringify!($arg), stringify!($arg))
    };
    (query, $arg:ident, $ty:ty, $key:literal) => {
        $crate::contract::ParamDecl::query::<$ty>(stringify!($arg), $key)
    };
    (header, $arg:ident, $ty:ty, $key:literal) => {
        $crate::contract::ParamDecl::header::<$ty>(stringify!($arg), $key)
    };
    (body, $arg:ident, $ty:ty) => {
        $crate::contract::ParamDecl::body::<$ty>(stringify!($arg))
    };
}
