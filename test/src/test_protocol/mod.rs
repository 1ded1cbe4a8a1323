use ripple_shared::{
    CallError, PropertyDescriptor, Protocol, ProtocolPlugin, RemoteMethod, Template, Value,
};

/// A small banking domain: a controller that signs up customers, customers
/// with an address and accounts, and server methods that move money
pub struct BankPlugin;

impl ProtocolPlugin for BankPlugin {
    fn build(&self, protocol: &mut Protocol) {
        protocol
            .add_template(controller())
            .add_template(customer())
            .add_template(address())
            .add_template(account());
    }
}

pub fn protocol() -> Protocol {
    let mut protocol = Protocol::builder();
    protocol.add_plugin(BankPlugin);
    protocol.build()
}

fn controller() -> Template {
    Template::new("Controller")
        .property("greeting", PropertyDescriptor::scalar(""))
        .property("customer", PropertyDescriptor::reference("Customer"))
        .method(
            "newCustomer",
            RemoteMethod::on_server(|scope, args| {
                let name = args.first().and_then(Value::as_str).unwrap_or_default().to_string();
                let customer = scope.create_object("Customer")?;
                scope.set_on(&customer, "name", name)?;
                scope.set("customer", customer.clone())?;
                Ok(Value::from(customer))
            }),
        )
}

fn customer() -> Template {
    Template::new("Customer")
        .property("name", PropertyDescriptor::scalar(""))
        .property("address", PropertyDescriptor::reference("Address"))
        .property("accounts", PropertyDescriptor::reference_array("Account"))
        .property("notes", PropertyDescriptor::scalar("").local())
        .method(
            "openAccount",
            RemoteMethod::on_server(|scope, _| {
                let account = scope.create_object("Account")?;
                let owner = scope.target().clone();
                scope.set_on(&account, "owner", owner)?;
                let target = scope.target().clone();
                scope
                    .session_mut()
                    .mutate_array(&target, "accounts", |accounts| {
                        accounts.push(Value::from(account.clone()))
                    })?;
                Ok(Value::from(account))
            }),
        )
}

fn address() -> Template {
    Template::new("Address").property("city", PropertyDescriptor::scalar(""))
}

fn account() -> Template {
    Template::new("Account")
        .property("balance", PropertyDescriptor::scalar(0))
        .property("owner", PropertyDescriptor::reference("Customer"))
        .property("audited", PropertyDescriptor::scalar(false).to_server(false))
        .method(
            "deposit",
            RemoteMethod::on_server(|scope, args| {
                let amount = amount(args)?;
                let balance = scope.get("balance")?.as_f64().unwrap_or_default();
                scope.set("balance", balance + amount)?;
                Ok(Value::from(balance + amount))
            })
            .with_server_validation(|_, _, args| {
                args.first()
                    .and_then(Value::as_f64)
                    .is_some_and(|amount| amount > 0.0)
            }),
        )
        .method(
            "withdraw",
            RemoteMethod::on_server(|scope, args| {
                let amount = amount(args)?;
                let balance = scope.get("balance")?.as_f64().unwrap_or_default();
                if amount > balance {
                    return Err(CallError::with_code(
                        "insufficient_funds",
                        format!("Cannot withdraw {} from {}", amount, balance),
                    ));
                }
                scope.set("balance", balance - amount)?;
                Ok(Value::from(balance - amount))
            }),
        )
        .method(
            "audit",
            RemoteMethod::on_server(|scope, _| {
                scope.set("audited", true)?;
                Ok(scope.get("balance")?.clone())
            }),
        )
        .method(
            "explode",
            RemoteMethod::on_server(|_, _| Err(CallError::application("Vault jammed"))),
        )
        .method("refresh", RemoteMethod::on_client(|_, _| Ok(Value::Null)))
        .validate_call(|session, object_id, _, _| {
            session
                .get(object_id.as_str(), "owner")
                .is_ok_and(|owner| !owner.is_null())
        })
}

fn amount(args: &[Value]) -> Result<f64, CallError> {
    args.first()
        .and_then(Value::as_f64)
        .ok_or_else(|| CallError::application("Expected an amount"))
}
